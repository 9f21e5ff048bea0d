//! The `quizgrade init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("quizgrade.toml").exists() {
        println!("quizgrade.toml already exists, skipping.");
    } else {
        std::fs::write("quizgrade.toml", SAMPLE_CONFIG)?;
        println!("Created quizgrade.toml");
    }

    std::fs::create_dir_all("quizzes")?;
    let example_path = Path::new("quizzes/example.toml");
    if example_path.exists() {
        println!("quizzes/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUIZ)?;
        println!("Created quizzes/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: quizgrade validate --quiz quizzes/example.toml");
    println!("  2. Write an answers file, e.g. [{{\"question_id\": \"capital\", \"selected_options\": [\"paris\"]}}]");
    println!("  3. Run: quizgrade grade --quiz quizzes/example.toml --answers answers.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizgrade configuration

# What happens to attempts that outlive the time limit:
# "auto_submit" grades what was saved, "mark_expired" leaves them unscored.
expiry_mode = "auto_submit"

[scoring]
numeric_tolerance = 0.001
# "all_or_nothing" or "partial_credit"
multi_select = "all_or_nothing"
short_answer_case_sensitive = false
"#;

const EXAMPLE_QUIZ: &str = r#"[quiz]
id = "example"
title = "Example Quiz"
description = "A short quiz to get started"
quiz_type = "practice"
time_limit_minutes = 15
max_attempts = 3
passing_score = 50.0
reduction = "highest"

[[questions]]
id = "capital"
type = "single_choice"
text = "What is the capital of France?"
points = 1

[[questions.options]]
id = "paris"
text = "Paris"
correct = true

[[questions.options]]
id = "lyon"
text = "Lyon"

[[questions]]
id = "primes"
type = "multi_select"
text = "Select every prime number."
points = 2

[[questions.options]]
id = "two"
text = "2"
correct = true

[[questions.options]]
id = "three"
text = "3"
correct = true

[[questions.options]]
id = "four"
text = "4"

[[questions]]
id = "pi"
type = "numerical"
text = "Give pi to two decimal places."
answers = ["3.14"]

[[questions]]
id = "reflection"
type = "essay"
text = "What did you find hardest this week?"
points = 3
"#;
