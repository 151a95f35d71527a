//! Built-in starter riddles, so a fresh store is playable without the generator.

use crate::remote::GeneratedRiddle;

fn seed(question: &str, answer: &str, origin: &str, language: &str) -> GeneratedRiddle {
  GeneratedRiddle {
    question: question.into(),
    answer: answer.into(),
    origin: Some(origin.into()),
    language: Some(language.into()),
  }
}

pub fn seed_riddles() -> Vec<GeneratedRiddle> {
  vec![
    seed("My house has no door and no window. What am I?", "An egg", "Cameroon", "French"),
    seed("I go to the river and come back without drinking. What am I?", "A road", "Nigeria", "Yoruba"),
    seed("The more you take, the more you leave behind. What are they?", "Footsteps", "Kenya", "Swahili"),
    seed("A small pot that cooks without fire. What is it?", "The mouth", "Senegal", "Wolof"),
    seed("I have a head but no hair, a bed but never sleep. What am I?", "A river", "Ghana", "Twi"),
  ]
}
