use std::io::{self, IsTerminal, Write};

pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    pub fn banner(&self, text: &str) -> String {
        self.paint("1;35", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    pub fn step_mark(&self) -> String {
        self.paint("1;36", "•")
    }

    pub fn ok_mark(&self) -> String {
        self.paint("1;32", "✓")
    }

    pub fn warn_mark(&self) -> String {
        self.paint("1;33", "!")
    }

    pub fn missing_mark(&self) -> String {
        self.paint("1;31", "✗")
    }
}

/// Line-oriented progress output on stdout.
pub struct Progress<W: Write> {
    out: W,
    palette: Palette,
}

impl Progress<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), Palette::auto())
    }
}

impl<W: Write> Progress<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self { out, palette }
    }

    pub fn banner(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.palette.banner(title))?;
        writeln!(
            self.out,
            "{}",
            self.palette
                .dim(&format!("version {}", env!("CARGO_PKG_VERSION")))
        )?;
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn step(&mut self, message: &str) -> io::Result<()> {
        let mark = self.palette.step_mark();
        self.line(&mark, message)
    }

    pub fn ok(&mut self, message: &str) -> io::Result<()> {
        let mark = self.palette.ok_mark();
        self.line(&mark, message)
    }

    pub fn warn(&mut self, message: &str) -> io::Result<()> {
        let mark = self.palette.warn_mark();
        self.line(&mark, message)
    }

    pub fn missing(&mut self, message: &str) -> io::Result<()> {
        let mark = self.palette.missing_mark();
        self.line(&mark, message)
    }

    pub fn note(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.palette.dim(message))?;
        self.out.flush()
    }

    pub fn heading(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.palette.heading(message))?;
        self.out.flush()
    }

    fn line(&mut self, mark: &str, message: &str) -> io::Result<()> {
        writeln!(self.out, "{mark} {message}")?;
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::{Palette, Progress};

    #[test]
    fn plain_palette_emits_no_escape_codes() {
        let mut progress = Progress::new(Vec::new(), Palette::plain());
        progress.step("copying hooks").expect("write");
        progress.ok("hooks copied").expect("write");
        progress.warn("one file skipped").expect("write");
        progress.note("details follow").expect("write");
        let text = String::from_utf8(progress.into_inner()).expect("utf8");
        assert_eq!(
            text,
            "• copying hooks\n✓ hooks copied\n! one file skipped\ndetails follow\n"
        );
    }

    #[test]
    fn enabled_palette_wraps_text_in_ansi_codes() {
        let palette = Palette { enabled: true };
        assert_eq!(palette.dim("x"), "\x1b[2mx\x1b[0m");
        assert_eq!(palette.ok_mark(), "\x1b[1;32m✓\x1b[0m");
    }

    #[test]
    fn banner_includes_version() {
        let mut progress = Progress::new(Vec::new(), Palette::plain());
        progress.banner("MOOD LIFTER").expect("write");
        let text = String::from_utf8(progress.into_inner()).expect("utf8");
        assert!(text.starts_with("MOOD LIFTER\nversion "));
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
    }
}
