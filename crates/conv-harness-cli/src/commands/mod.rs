pub mod perf;
pub mod run;
