use std::io::Write;
use std::time::{Duration, Instant};

const WIDTH: usize = 40;
const REDRAW_INTERVAL: Duration = Duration::from_millis(40);
const THROBBER: [char; 4] = ['|', '/', '-', '\\'];

/// A single-line download progress bar.
///
/// With a known total it draws `  42% [████------] /`, otherwise the
/// number of kilobytes received so far.
pub struct ProgressBar<W: Write> {
    total: Option<u64>,
    current: u64,
    indent: usize,
    out: W,
    last_draw: Option<Instant>,
    throb: usize,
}

impl<W: Write> ProgressBar<W> {
    pub fn new(total: Option<u64>, indent: usize, out: W) -> Self {
        Self { total: total.filter(|t| *t > 0), current: 0, indent, out, last_draw: None, throb: 0 }
    }

    /// Records `n` more bytes and redraws at most every 40ms.
    pub fn update(&mut self, n: usize) {
        self.current += n as u64;
        if self.last_draw.is_none_or(|at| at.elapsed() > REDRAW_INTERVAL) {
            self.draw(false);
            self.last_draw = Some(Instant::now());
        }
    }

    /// Draws the completed bar and ends the line.
    pub fn finish(mut self) -> W {
        self.draw(true);
        let _ = writeln!(self.out);
        let _ = self.out.flush();
        self.out
    }

    fn draw(&mut self, finished: bool) {
        let line = self.render(finished);
        self.throb += 1;
        // progress output is best-effort
        let _ = write!(self.out, "\r{line}");
        let _ = self.out.flush();
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn render(&self, finished: bool) -> String {
        let indent = " ".repeat(self.indent);
        let throb = if finished { ' ' } else { THROBBER[self.throb % THROBBER.len()] };

        let Some(total) = self.total else {
            return format!("{indent}{} KB {throb}", self.current / 1024);
        };

        let fraction = if finished { 1.0 } else { (self.current as f64 / total as f64).min(1.0) };
        let filled = ((fraction * WIDTH as f64) as usize).min(WIDTH);
        let bar = "█".repeat(filled) + &"-".repeat(WIDTH - filled);
        format!("{indent}{:6.0}% [{bar}] {throb}", fraction * 100.0)
    }
}
