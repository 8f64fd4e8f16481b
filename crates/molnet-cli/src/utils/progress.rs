use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use molnet::engine::progress::{Progress, ProgressCallback};
use std::fmt::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const TICK: Duration = Duration::from_millis(80);

/// Renders engine progress on a single stderr bar.
///
/// A phase shows as a spinner labelled with the phase name; a task inside the phase
/// turns the spinner into a bar until the phase finishes.
#[derive(Clone)]
pub struct CliProgressHandler {
    bar: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target).with_style(spinner_style());
        bar.finish_and_clear();
        Self {
            bar: Arc::new(Mutex::new(bar)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let bar = Arc::clone(&self.bar);
        Box::new(move |event: Progress| match bar.lock() {
            Ok(bar) => render(&bar, event),
            Err(_) => warn!("Progress bar mutex was poisoned; dropping progress event."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn render(bar: &ProgressBar, event: Progress) {
    match event {
        Progress::PhaseStart { name } => {
            bar.reset();
            bar.set_length(0);
            bar.set_style(spinner_style());
            bar.set_message(name);
            bar.enable_steady_tick(TICK);
        }
        Progress::TaskStart { total_steps } => {
            bar.disable_steady_tick();
            bar.set_style(bar_style());
            bar.set_length(total_steps);
            bar.set_position(0);
        }
        Progress::TaskIncrement => bar.inc(1),
        Progress::TaskIncrementBy(steps) => bar.inc(steps),
        Progress::TaskFinish => {
            if let Some(total) = bar.length() {
                bar.set_position(total);
            }
        }
        Progress::PhaseFinish => {
            bar.disable_steady_tick();
            bar.finish_with_message(format!("✓ {}", bar.message()));
        }
        Progress::Message(text) => bar.println(format!("  {}", text)),
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}
