//! Core library for the tabula-tools command line application.
//!
//! The library merges tabular sources into one table and reports on it.
//! Source adapters live under [`tabula::tools::io`], the typed table in
//! [`tabula::tools::model`], coercion in [`tabula::tools::load`], the
//! stages in [`tabula::tools::merge`], [`tabula::tools::aggregate`],
//! [`tabula::tools::accumulate`] and [`tabula::tools::sort`], sheet layout
//! in [`tabula::tools::write`], and the orchestration of a whole run under
//! [`tabula::tools::pipeline`].

pub mod tabula;

pub use tabula::tools::{
    Result, ToolError, accumulate, aggregate, chart, config, error, io, load, merge, model,
    pipeline, sort, transform, write,
};
