pub mod completion;
pub mod domain;
pub mod memory;
pub mod pinyin;
pub mod ports;
pub mod progress;
pub mod timer;
pub mod validation;
pub mod weakness;

pub use completion::{CompletionReport, CompletionSnapshot, ReportInputs};
pub use domain::{
    AnsweredQuestion, AuthSession, ExerciseType, IncorrectItem, PostQuizWeakness,
    PreQuizWeakness, ProgressRecord, ProgressUpdate, QuestionResult, QuizAttemptRecord,
    QuizAttemptSummary, User,
};
pub use memory::InMemoryProgressStore;
pub use ports::{AuthError, AuthResult, AuthService, PortError, PortResult, ProgressStore};
pub use progress::{ProgressDisplayRow, ProgressStatus};
pub use timer::QuestionTimer;
pub use validation::{AnswerKey, BlankAnswerMap};
pub use weakness::{Trend, WeaknessChange, WeaknessProfile};
