//! Built-in, topic-templated content used when no LLM is configured.
//! Guarantees the app is usable offline; answer options are shuffled per call.

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::domain::{ExamContent, ListeningSection, Question, ReadingSection, ReadingTest, SpeakingSection, WritingSection};
use crate::error::GenerationError;
use crate::session::ContentGenerator;

/// Offline `ContentGenerator`.
pub struct TemplateGenerator;

#[async_trait]
impl ContentGenerator for TemplateGenerator {
  async fn generate_exam(&self, topic: &str) -> Result<ExamContent, GenerationError> {
    Ok(template_exam(topic))
  }

  fn name(&self) -> &str {
    "template"
  }
}

fn mcq(text: &str, answer: &str, distractors: [&str; 3]) -> Question {
  let mut options: Vec<String> = std::iter::once(answer).chain(distractors).map(String::from).collect();
  options.shuffle(&mut rand::thread_rng());
  Question { text: text.to_string(), options, correct_answer: answer.to_string() }
}

fn reading_passage(topic: &str) -> String {
  format!(
    "THE EVOLUTION AND IMPACT OF {upper} IN CONTEMPORARY SOCIETY\n\n\
     In recent years, the proliferation of {t} has sparked considerable debate among scholars and industry leaders alike. \
     While proponents argue that {t} serves as a catalyst for unprecedented innovation, critics warn of its potential to \
     disrupt established socio-economic frameworks.\n\n\
     One of the most profound impacts of {t} can be observed in automation and human resources. Studies indicate a \
     paradigm shift where traditional roles are being augmented, or in some cases entirely replaced. The integration of \
     {t} has nonetheless led to large gains in efficiency and the creation of new, highly specialized industries.\n\n\
     The environmental implications of {t} present a distinct dichotomy. Advanced analytics enable optimized resource \
     management, yet the immense infrastructural demands contribute significantly to rising carbon footprints. \
     Ultimately, the future trajectory of {t} will depend largely on international regulatory policies and rigid \
     ethical considerations.",
    upper = topic.to_uppercase(),
    t = topic,
  )
}

fn reading_questions() -> Vec<Question> {
  vec![
    mcq("What has the proliferation of the topic sparked among scholars?", "Considerable debate", ["Global wars", "Economic collapse", "Universal agreement"]),
    mcq("What do critics warn about?", "Disruption of socio-economic frameworks", ["Lack of innovation", "Loss of traditional cultures", "Decreased efficiency"]),
    mcq("How is the impact on human resources described?", "A paradigm shift", ["Insignificant", "Purely destructive", "Entirely beneficial"]),
    mcq("What dichotomy is presented regarding the environment?", "Optimized management vs. infrastructural demands", ["High costs vs. low yields", "Public support vs. government opposition", "Clean energy vs. fossil fuels"]),
    mcq("What will largely determine the future trajectory of this field?", "Regulatory policies and ethics", ["Consumer demands", "Technological breakthroughs", "Financial markets"]),
  ]
}

pub fn template_writing_prompt(topic: &str) -> String {
  format!(
    "The rapid advancement of {t} is changing the world in unprecedented ways. Some people believe that it brings more \
     drawbacks than benefits to society. To what extent do you agree or disagree with this statement?",
    t = topic
  )
}

/// Complete four-skill mock test for `topic`.
pub fn template_exam(topic: &str) -> ExamContent {
  let script = format!(
    "Welcome to the advanced IELTS mock test lecture. Today's session delves deep into the multifaceted domain of {t}. \
     Over the past decade, {t} has not only revolutionized our fundamental understanding of societal structures but also \
     introduced highly complex challenges. We will explore three main paradigms today: its historical context, \
     contemporary applications, and future trajectories.\n\n\
     Early adoption revealed a landscape fraught with skepticism. However, as contemporary applications demonstrated \
     unprecedented efficiency, global markets rapidly integrated these principles. Experts argue that mitigating upcoming \
     risks requires proactive legislation rather than reactive measures. Looking at projections for the next twenty years, \
     the infrastructural demands alone will require trillions of dollars in global investment.",
    t = topic
  );
  let focus = format!("The multifaceted domain of {}", topic);

  ExamContent {
    listening: ListeningSection {
      script,
      questions: vec![
        mcq("What is the primary focus of today's lecture?", &focus, ["Basic societal structures", "Historical mistakes", "Future technologies"]),
        mcq("What has changed over the past decade according to the speaker?", "Fundamental understanding of societal structures", ["Nothing significant", "The global economy", "Educational paradigms"]),
        mcq("What is required to mitigate upcoming risks?", "Proactive legislation", ["Reactive measures", "Financial investments", "Ignoring the problems"]),
        mcq("How many main paradigms will the lecture explore?", "Three", ["Two", "Four", "Five"]),
        mcq("What will require trillions of dollars in investments?", "Infrastructural demands", ["Educational reforms", "Space exploration", "Military defense"]),
      ],
    },
    reading: ReadingSection {
      title: Some(format!("The Evolution and Impact of {}", topic)),
      passage: reading_passage(topic),
      questions: reading_questions(),
    },
    writing: WritingSection { prompt: template_writing_prompt(topic) },
    speaking: SpeakingSection {
      questions: vec![
        format!("Let's discuss {}. How has it influenced your daily routine or professional life?", topic),
        format!("What are the most significant challenges associated with {} in your country?", topic),
        format!("Looking ahead, how do you foresee {} evolving over the next 50 years?", topic),
      ],
    },
  }
}

/// Standalone reading practice test for `topic`.
pub fn template_reading(topic: &str) -> ReadingTest {
  ReadingTest {
    title: format!("The Evolution and Impact of {}", topic),
    passage: reading_passage(topic),
    questions: reading_questions(),
  }
}
