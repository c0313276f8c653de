pub mod engine;
pub mod rules;
pub mod terminal;

pub use engine::{Game, GameEvent, PendingAnswer, Phase, Resolution};
pub use rules::{Answer, AnswerRequirement, Ask, RulePolicy, TurnAdvance, WinScan};
pub use terminal::{History, Settlement, detect_forced_win, forced_winners, settle, tie_break};
