//! # RPCS3 Log Doctor
//!
//! A diagnostic engine for RPCS3 emulator logs.
//!
//! An uploaded attachment is unpacked, streamed through a sectioned field
//! extractor, normalized into canonical values, and evaluated by a rule
//! engine that produces glyph-ranked notes and named report sections.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐
//! │  Archive   │──▶│ Extraction │──▶│ Normalize  │──▶│   Rules    │
//! │ gz/zip/7z  │   │  sections  │   │ drivers/OS │   │ notes +    │
//! │ rar/plain  │   │  + piracy  │   │ AMD table  │   │ sections   │
//! └────────────┘   └────────────┘   └────────────┘   └─────┬──────┘
//!                                                          │
//!                    LogPipeline (slots, spawn_blocking) ◀─┘
//!                          │
//!                 ┌────────┴────────┐
//!                 ▼                 ▼
//!            text report       JSON report
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`archive`] | Format detection and log streams from archives |
//! | [`extraction`] | Sliding-window state machine over log lines |
//! | [`sections`] | Section triggers and extractor patterns |
//! | [`normalize`] | Canonical values and the typed view |
//! | [`drivers`] | Vendor GPU driver version decoding |
//! | [`amd`] | AMD driver version table and its refresh |
//! | [`os_names`] | Windows/macOS release names |
//! | [`rules`] | Rule engine: notes, sections and enrichment seams |
//! | [`similarity`] | Bigram clustering of fatal errors |
//! | [`pipeline`] | One upload end to end, with the slot pool |
//! | [`report`] | Text and JSON rendering |
//! | [`diagnose_cmd`] | The `logdoc diagnose` command |
//! | [`progress`] | Progress on stderr |
//! | [`models`] | Attachment and extraction data types |
//! | [`version`] | Dotted version numbers |
//! | [`config`] | TOML configuration parsing |

pub mod amd;
pub mod archive;
pub mod config;
pub mod diagnose_cmd;
pub mod drivers;
pub mod extraction;
pub mod models;
pub mod normalize;
pub mod os_names;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod rules;
pub mod sections;
pub mod similarity;
pub mod version;
