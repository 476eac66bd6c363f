pub mod classifier;

pub use classifier::{classify, classify_all, classify_burst, Acceptance, Category, Policy, Verdict};
