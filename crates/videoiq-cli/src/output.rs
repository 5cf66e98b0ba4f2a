//! Terminal rendering of progress events and results.

use std::fmt::Write as _;
use std::io::Write as _;
use tokio::sync::mpsc::UnboundedReceiver;

use videoiq_core::index::IndexStats;
use videoiq_core::pipeline::IndexingEvent;
use videoiq_core::query::{AudioMatches, QueryResults};
use videoiq_core::session::AnalysisSession;
use videoiq_core::format_timestamp;

const BAR_WIDTH: usize = 30;

/// Renders events on stderr until the orchestrator drops its sender
pub async fn render_progress(mut rx: UnboundedReceiver<IndexingEvent>) {
    let mut stderr = std::io::stderr();
    while let Some(event) = rx.recv().await {
        match event {
            IndexingEvent::Progress {
                fraction, message, ..
            } => {
                let _ = write!(stderr, "\r{}", progress_line(fraction, &message));
                let _ = stderr.flush();
            }
            IndexingEvent::Warning { message } => {
                let _ = writeln!(stderr, "\nwarning: {}", message);
            }
            IndexingEvent::Failed { error } => {
                let _ = writeln!(stderr, "\nanalysis failed: {}", error);
            }
            IndexingEvent::Completed { .. } => {
                let _ = writeln!(stderr);
            }
            IndexingEvent::StateChanged { .. } => {}
        }
    }
}

/// `[#####-----]  50% message`, padded so shorter messages overwrite longer ones
pub fn progress_line(fraction: f32, message: &str) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * BAR_WIDTH as f32).round() as usize;
    format!(
        "[{}{}] {:>3}% {:<50}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        (fraction * 100.0).round() as u32,
        message
    )
}

pub fn print_analysis(session: &AnalysisSession, stats: &IndexStats) {
    println!("Session {}", session.id());
    println!("  source:   {}", session.source().path().display());
    println!("  modality: {}", session.modality());
    println!("  speech:   {} records", stats.speech_records);
    println!("  visual:   {} records", stats.visual_records);
}

pub fn format_results(results: &QueryResults) -> String {
    let mut out = String::new();

    if !results.visual.is_empty() {
        let _ = writeln!(out, "Visual matches");
        for hit in &results.visual {
            let _ = writeln!(
                out,
                "  {:>8}  {:.3}  {}",
                format_timestamp(f64::from(hit.timestamp)),
                hit.score,
                hit.image_path.display()
            );
        }
    }

    match &results.audio {
        AudioMatches::Exact { total, hits } => {
            let _ = writeln!(out, "Said ({} of {})", hits.len(), total);
            for hit in hits {
                let _ = writeln!(out, "  {:>8}  {}", format_timestamp(hit.timestamp), hit.text);
            }
        }
        AudioMatches::Semantic { hits } if hits.is_empty() => {
            let _ = writeln!(out, "No audio matches");
        }
        AudioMatches::Semantic { hits } => {
            let _ = writeln!(out, "Contextual match");
            for hit in hits {
                let _ = writeln!(
                    out,
                    "  {:>8}  {:.3}  {}",
                    format_timestamp(hit.timestamp),
                    hit.score,
                    hit.text
                );
            }
        }
    }

    out
}

pub fn format_status(session: Option<&AnalysisSession>, stats: &IndexStats) -> String {
    let mut out = String::new();
    match session {
        Some(session) => {
            let _ = writeln!(out, "Session {}", session.id());
            let _ = writeln!(out, "  source:    {}", session.source().path().display());
            let _ = writeln!(out, "  modality:  {}", session.modality());
            let _ = writeln!(out, "  completed: {}", session.completed_at().to_rfc3339());
        }
        None => {
            let _ = writeln!(out, "No analyzed session");
        }
    }
    let _ = writeln!(out, "Speech records: {}", stats.speech_records);
    let _ = writeln!(out, "Visual records: {}", stats.visual_records);
    out
}
