//! Questionnaire engine: survey authoring with branching questions, response
//! aggregation, section feedback scoring and the mobile web-service surface.

pub mod config;
pub mod error;
pub mod mobile;
pub mod survey;
pub mod telemetry;
