use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Ingest;

#[derive(Copy, Clone, Debug)]
pub enum Phase { LoadCursor, Page, Fetch, Write, Actors, Stats, SaveCursor }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::LoadCursor => "load_cursor",
        Phase::Page => "page",
        Phase::Fetch => "fetch",
        Phase::Write => "write",
        Phase::Actors => "actors",
        Phase::Stats => "stats",
        Phase::SaveCursor => "save_cursor",
    }}
    fn span(&self) -> Span { match self {
        Phase::LoadCursor => info_span!("load_cursor"),
        Phase::Page => info_span!("page"),
        Phase::Fetch => info_span!("fetch"),
        Phase::Write => info_span!("write"),
        Phase::Actors => info_span!("actors"),
        Phase::Stats => info_span!("stats"),
        Phase::SaveCursor => info_span!("save_cursor"),
    }}
}

impl OpMarker for Ingest {
    const NAME: &'static str = "ingest";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("ingest") }
}
