//! CLI interface for skillsprout

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::time::Duration;

use crate::agent::{completion_service, Question};
use crate::config::{self, Config};
use crate::orchestrator::{LessonCompletion, QuizOutcome, SkillBuilder};
use crate::types::PREDEFINED_SKILLS;

#[derive(Parser)]
#[command(name = "skillsprout")]
#[command(about = "AI-powered microlearning with adaptive lessons, quizzes and achievements", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Read configuration from this file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config and MCP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind
        #[arg(long)]
        host: Option<String>,
    },
    /// Learn interactively in the terminal (default when no command given)
    Learn {
        /// Skill to study; prompts with the predefined list when omitted
        #[arg(short, long)]
        skill: Option<String>,
        /// Learner id
        #[arg(short, long, default_value = "learner")]
        user: String,
    },
    /// List the predefined skills
    Skills,
    /// Show or initialize configuration
    Config {
        /// Show current configuration (default; wins over --init and --path)
        #[arg(long)]
        show: bool,
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
        /// Print the config file path
        #[arg(long)]
        path: bool,
    },
}

/// What `config` does for a given flag combination
#[derive(Debug, PartialEq, Eq)]
enum ConfigAction {
    Show,
    Init,
    Path,
}

impl ConfigAction {
    fn from_flags(show: bool, init: bool, path: bool) -> Self {
        match (show, init, path) {
            (false, _, true) => ConfigAction::Path,
            (false, true, false) => ConfigAction::Init,
            _ => ConfigAction::Show,
        }
    }
}

impl Cli {
    /// Load configuration from `--config` or the default path, with env overrides
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => {
                let mut config = Config::load_from(path)?;
                config.apply_env();
                Ok(config)
            }
            None => Config::load(),
        }
    }
}

/// Run the parsed command
pub async fn run(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Some(Commands::Serve { port, host }) => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            crate::server::start(config).await?;
        }
        Some(Commands::Learn { skill, user }) => {
            learn(config, skill, &user).await?;
        }
        None => {
            learn(config, None, "learner").await?;
        }
        Some(Commands::Skills) => {
            println!("Predefined skills:");
            for (i, skill) in PREDEFINED_SKILLS.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, skill);
            }
            println!("\nAny other skill name works too.");
        }
        Some(Commands::Config { show, init, path }) => {
            let target = match cli.config {
                Some(p) => p,
                None => config::config_path()?,
            };
            match ConfigAction::from_flags(show, init, path) {
                ConfigAction::Path => println!("{}", target.display()),
                ConfigAction::Init if target.exists() => {
                    println!("Config already exists at {}", target.display());
                }
                ConfigAction::Init => {
                    Config::default().save_to(&target)?;
                    println!("✅ Wrote default config to {}", target.display());
                }
                ConfigAction::Show => config::show_config(&config)?,
            }
        }
    }

    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.dim} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Read a line, returning None on Ctrl-C / Ctrl-D
fn prompt(rl: &mut DefaultEditor, text: &str) -> Result<Option<String>> {
    match rl.readline(text) {
        Ok(line) => Ok(Some(line.trim().to_string())),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e).context("Failed to read input"),
    }
}

fn choose_skill(rl: &mut DefaultEditor) -> Result<Option<String>> {
    println!("\nWhat would you like to learn?");
    for (i, skill) in PREDEFINED_SKILLS.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, skill);
    }
    loop {
        let Some(input) = prompt(rl, "Skill (number or name): ")? else {
            return Ok(None);
        };
        if input.is_empty() {
            continue;
        }
        let skill = match input.parse::<usize>() {
            Ok(n) if (1..=PREDEFINED_SKILLS.len()).contains(&n) => PREDEFINED_SKILLS[n - 1].to_string(),
            _ => input,
        };
        return Ok(Some(skill));
    }
}

/// Map shorthand input (option number, t/f) onto the answer text
fn expand_answer(question: &Question, input: &str) -> String {
    match question {
        Question::MultipleChoice { options, .. } => match input.parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => options[n - 1].clone(),
            _ => input.to_string(),
        },
        Question::TrueFalse { .. } => match input.to_lowercase().as_str() {
            "t" | "1" => "true".to_string(),
            "f" | "2" => "false".to_string(),
            _ => input.to_string(),
        },
        Question::ShortAnswer { .. } => input.to_string(),
    }
}

fn print_completion(done: &LessonCompletion) {
    println!(
        "\n✅ Lesson complete: {} ({} lessons in {})",
        done.lesson_title, done.progress.lessons_completed, done.skill
    );
    for achievement in &done.new_achievements {
        println!("🏅 Achievement unlocked: {} {}", achievement.icon, achievement.name);
    }
}

fn print_outcome(outcome: &QuizOutcome) {
    println!();
    for (i, r) in outcome.result.results.iter().enumerate() {
        let mark = if r.correct { "✓" } else { "✗" };
        println!("{} {}. {}", mark, i + 1, r.question);
        if !r.correct {
            println!("    Correct answer: {}", r.correct_answer);
        }
        if !r.explanation.is_empty() {
            println!("    {}", r.explanation);
        }
    }
    println!(
        "\nScore: {}/{} ({:.1}%)",
        outcome.result.correct,
        outcome.result.total,
        outcome.result.percentage()
    );
    println!(
        "Difficulty: {}  Mastery: {:.0}/100",
        outcome.progress.current_difficulty.title(),
        outcome.mastery_level
    );
    println!("{}", outcome.recommendation);
    for achievement in &outcome.new_achievements {
        println!("🏅 Achievement unlocked: {} {}", achievement.icon, achievement.name);
    }
    println!(
        "⭐ {} points, level {}, {}-day streak",
        outcome.stats.total_points, outcome.stats.level, outcome.stats.streak_days
    );
}

/// Interactive lesson → quiz loop
async fn learn(config: Config, skill: Option<String>, user: &str) -> Result<()> {
    if !config.llm.is_configured() {
        println!("⚠ LLM provider not configured, lessons will use fallback content.");
        println!("  Run 'skillsprout config' for details.");
    }
    let builder = SkillBuilder::new(completion_service(&config.llm), &config.learning);
    let mut rl = DefaultEditor::new().context("Failed to initialize line editor")?;

    let skill = match skill {
        Some(s) => s,
        None => match choose_skill(&mut rl)? {
            Some(s) => s,
            None => return Ok(()),
        },
    };

    loop {
        let pb = spinner("Preparing your lesson...");
        let lesson = builder.start_lesson(user, &skill, None).await;
        pb.finish_and_clear();
        let lesson = lesson?;

        println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("📖 {}", lesson.title);
        println!(
            "   {} · {} · ~{} min",
            lesson.skill,
            lesson.difficulty.title(),
            lesson.duration_minutes
        );
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        println!("{}\n", lesson.content);
        if !lesson.key_concepts.is_empty() {
            println!("Key concepts: {}\n", lesson.key_concepts.join(", "));
        }

        if prompt(&mut rl, "Press Enter when you're done reading (Ctrl-D to quit) ")?.is_none() {
            return Ok(());
        }

        let pb = spinner("Building your quiz...");
        let done = builder.complete_lesson(user).await;
        pb.finish_and_clear();
        let done = done?;
        print_completion(&done);

        println!("\n📝 Quiz: {}", done.quiz.lesson_title);
        let mut answers = Vec::with_capacity(done.quiz.questions.len());
        for (i, question) in done.quiz.questions.iter().enumerate() {
            println!("\n{}. {}", i + 1, question.text());
            if let Question::MultipleChoice { options, .. } = question {
                for (j, option) in options.iter().enumerate() {
                    println!("   {}) {}", j + 1, option);
                }
            } else if let Question::TrueFalse { .. } = question {
                println!("   1) True\n   2) False");
            }
            let Some(input) = prompt(&mut rl, "> ")? else {
                return Ok(());
            };
            answers.push(expand_answer(question, &input));
        }

        let outcome = builder.submit_quiz(user, &answers).await?;
        print_outcome(&outcome);

        match prompt(&mut rl, "\nAnother lesson? [Y/n] ")? {
            Some(answer) if answer.is_empty() || answer.eq_ignore_ascii_case("y") => continue,
            _ => break,
        }
    }

    println!("\n👋 Keep learning!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["skillsprout", "serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(9000), host: None })));

        let cli = Cli::try_parse_from(["skillsprout", "learn", "-s", "Python"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Learn { skill: Some(ref s), ref user }) if s == "Python" && user == "learner"
        ));

        let cli = Cli::try_parse_from(["skillsprout"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_config_flags() {
        assert_eq!(ConfigAction::from_flags(false, false, false), ConfigAction::Show);
        assert_eq!(ConfigAction::from_flags(false, true, false), ConfigAction::Init);
        assert_eq!(ConfigAction::from_flags(false, true, true), ConfigAction::Path);
        assert_eq!(ConfigAction::from_flags(false, false, true), ConfigAction::Path);
        assert_eq!(ConfigAction::from_flags(true, true, true), ConfigAction::Show);

        let cli = Cli::try_parse_from(["skillsprout", "config", "--show", "--path"]).unwrap();
        let Some(Commands::Config { show, init, path }) = cli.command else {
            panic!("expected config command");
        };
        assert_eq!(ConfigAction::from_flags(show, init, path), ConfigAction::Show);
    }

    #[test]
    fn test_expand_answer() {
        let mc = Question::MultipleChoice {
            question: "Pick".to_string(),
            options: vec!["Alpha".to_string(), "Beta".to_string()],
            correct_answer: "Beta".to_string(),
            explanation: String::new(),
        };
        assert_eq!(expand_answer(&mc, "2"), "Beta");
        assert_eq!(expand_answer(&mc, "7"), "7");
        assert_eq!(expand_answer(&mc, "alpha"), "alpha");

        let tf = Question::TrueFalse {
            question: "Sky is blue".to_string(),
            correct_answer: true,
            explanation: String::new(),
        };
        assert_eq!(expand_answer(&tf, "T"), "true");
        assert_eq!(expand_answer(&tf, "2"), "false");
    }
}
