#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! CaseOLAP scoring: ranks how popular and how distinctive each entity is within
//! each category of a categorized publication corpus.
//!
//! The computation is a strict pipeline of pure stages:
//! [`aggregate`] -> ([`popularity`], [`distinctiveness`]) -> [`combine`],
//! orchestrated by [`pipeline`]. [`io`], [`config`] and [`export`] connect it to
//! files on disk.

pub mod aggregate;
pub mod combine;
pub mod config;
pub mod distinctiveness;
pub mod export;
pub mod io;
pub mod pipeline;
pub mod popularity;
pub mod types;

pub use combine::{RankedEntity, ScoreKind, ScoreRecord, ScoreTables};
pub use pipeline::{ScoringError, ScoringRun, score_corpus, score_with_universe};
pub use types::{
    CategoryPublications, ExecutionMode, PublicationMentions, ScoringInputs,
};
