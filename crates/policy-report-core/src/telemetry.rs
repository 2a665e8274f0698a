//! Centralised tracing initialisation for the policy report binary.
//!
//! Text lines read `LEVEL YYYY-MM-DD HH:MM:SS,mmm ThreadId(n): message` on
//! stdout. JSON lines carry the same local timestamp and thread id as fields.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored since
//! the global subscriber can only be set once per process.

use std::fmt;

use chrono::{DateTime, Local};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber.
///
/// * `json` - emit newline-delimited JSON log lines.
/// * `level` - default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(LocalTimer)
                    .with_thread_ids(true)
                    .with_current_span(true),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().event_format(LevelFirstFormat))
            .try_init()
            .ok();
    }
}

fn timestamp(now: &DateTime<Local>) -> String {
    now.format("%Y-%m-%d %H:%M:%S,%3f").to_string()
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        w.write_str(&timestamp(&Local::now()))
    }
}

/// Level, local time and thread id ahead of the event fields.
struct LevelFirstFormat;

impl<S, N> FormatEvent<S, N> for LevelFirstFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} {} {:?}: ",
            event.metadata().level(),
            timestamp(&Local::now()),
            std::thread::current().id()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
