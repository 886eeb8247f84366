use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use adaptive_quiz::quiz::{
    config::EngineConfig,
    error::SessionError,
    grader::{ChatGptEssayGrader, EssayGrader},
    parser::{parse_with_report, validate_question_set},
    scoring::Grading,
    session::AssessmentSession,
    store::{InMemoryProfileStore, InMemoryQuestionStore, ProfileStore, QuestionStore},
    Answers, AssessmentState, Question, QuestionKind, QuestionSetId, Variant,
};
use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use log::{debug, info, warn};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const DEFAULT_QUESTION_DIR: &str = "questions";
const DEFAULT_STUDENT: &str = "student";
const DEFAULT_SKILL: &str = "english";
const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

struct Args {
    question_dir: String,
    student_id: String,
    skill: String,
    level: u32,
}

impl Args {
    /// `adaptive-quiz [question_dir] [student_id] [level] [skill]`
    fn from_env() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let question_dir = args.next().unwrap_or_else(|| DEFAULT_QUESTION_DIR.to_string());
        let student_id = args.next().unwrap_or_else(|| DEFAULT_STUDENT.to_string());
        let level = match args.next() {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| format!("level must be a positive number, got '{}'", raw))?,
            None => 1,
        };
        let skill = args.next().unwrap_or_else(|| DEFAULT_SKILL.to_string());
        Ok(Self {
            question_dir,
            student_id,
            skill,
            level,
        })
    }
}

#[tokio::main]
async fn main() -> HandlerResult {
    // The key may also come straight from the environment
    if dotenv().is_err() {
        debug!("No .env file found");
    }
    pretty_env_logger::init();
    info!("Starting assessment console...");

    let args = Args::from_env()?;
    let config = EngineConfig::from_env();
    let chatgpt_api_key =
        std::env::var("CHATGPT_API_KEY").map_err(|_| "CHATGPT_API_KEY is not set")?;

    let grader: Arc<dyn EssayGrader> = {
        let mut gpt = ChatGPT::new(chatgpt_api_key)?;

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = config.grading_timeout;

        Arc::new(ChatGptEssayGrader::new(gpt))
    };

    let store = Arc::new(InMemoryQuestionStore::new());
    let imported = import_question_sets(Path::new(&args.question_dir), store.as_ref()).await?;
    let set_ids = store
        .set_ids()
        .await
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    info!(
        "Imported {} question sets from {}: {}",
        imported, args.question_dir, set_ids
    );

    let profiles = InMemoryProfileStore::new();
    let mut session = AssessmentSession::new(
        store,
        grader,
        config,
        AssessmentState::new(args.level, Variant::A),
    );

    run_ladder(&mut session, &profiles, &args).await?;

    for record in profiles.records().await {
        info!(
            "Recorded {} at level {} for {}",
            record.skill, record.level, record.student_id
        );
    }
    Ok(())
}

/// Imports every `L{level}-{variant}.txt` file in `dir` through the parser.
async fn import_question_sets(
    dir: &Path,
    store: &dyn QuestionStore,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let mut imported = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Some(set_id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<QuestionSetId>().ok())
        else {
            warn!("Skipping {}: name is not like L1-A.txt", path.display());
            continue;
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let report = parse_with_report(&text);
        if !report.is_complete() {
            warn!(
                "{}: {} markers but only {} questions parsed, please review",
                set_id,
                report.markers_seen,
                report.questions.len()
            );
        }
        for issue in validate_question_set(&report.questions) {
            warn!("{}: {:?}", set_id, issue);
        }

        store.save_questions(set_id, report.questions).await?;
        imported += 1;
    }
    Ok(imported)
}

async fn run_ladder(
    session: &mut AssessmentSession,
    profiles: &dyn ProfileStore,
    args: &Args,
) -> HandlerResult {
    loop {
        let questions = match session.begin().await {
            Ok(questions) => questions.to_vec(),
            Err(SessionError::NoContent { level, variant }) => {
                println!(
                    "There is no test for level {} variant {} yet. Please tell your teacher.",
                    level, variant
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        println!("\n=== {} ===", session.state());
        let answers = ask_questions(&questions)?;

        println!("Grading...");
        let result = session.submit_answers(&answers).await?;

        for item in &result.breakdown {
            match &item.grading {
                Grading::Graded { score, feedback } => {
                    println!("{}: {:.0}/100. {}", item.question_id, score, feedback)
                }
                Grading::Fallback { .. } => println!(
                    "{}: could not be graded right now, a provisional score was given",
                    item.question_id
                ),
                Grading::Deterministic { correct } => println!(
                    "{}: {}",
                    item.question_id,
                    if *correct { "correct" } else { "wrong" }
                ),
            }
        }
        println!("Score: {}/100", result.score);
        println!("{}", result.message);

        if result.passed {
            profiles
                .record_skill_level(&args.student_id, &args.skill, result.prior_state.level)
                .await?;
            return Ok(());
        }
        if result.needs_teacher() {
            return Ok(());
        }
        session.advance()?;
    }
}

fn ask_questions(questions: &[Question]) -> io::Result<Answers> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut answers = Answers::new();

    for question in questions {
        println!("\nQuestion {}: {}", question.order, question.prompt);
        if question.kind == QuestionKind::MultipleChoice {
            for (letter, option) in OPTION_LETTERS.iter().zip(&question.options) {
                println!("  {}. {}", letter, option);
            }
        }
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        answers.insert(question.id.clone(), resolve_answer(question, line));
    }
    Ok(answers)
}

/// Lets the student type an option letter instead of the full option text.
fn resolve_answer(question: &Question, input: &str) -> String {
    if question.kind == QuestionKind::MultipleChoice && input.chars().count() == 1 {
        let letter = input.to_ascii_uppercase();
        if let Some(option) = OPTION_LETTERS
            .iter()
            .position(|l| letter.starts_with(*l))
            .and_then(|idx| question.options.get(idx))
        {
            return option.clone();
        }
    }
    input.to_string()
}
