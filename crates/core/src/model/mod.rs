mod attempt;
mod ids;
mod question;
mod quiz;
mod result;

pub use ids::{AttemptId, ParseIdError, QuestionId, QuizId, ResultId};

pub use attempt::{AttemptStatus, AttemptTrigger};
pub use question::{OptionKey, Question, QuestionError, QuestionOptions};
pub use quiz::{FALLBACK_QUIZ_TITLE, Quiz, QuizError, display_title};
pub use result::{AttemptResult, AttemptResultError, NewAttemptResult};
