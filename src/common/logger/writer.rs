use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;

/// Appends log lines to a file and trims the oldest lines once the file grows
/// past `max_lines`.
#[derive(Clone)]
pub struct CappedFileWriter {
    path: String,
    max_lines: u32,
    lines_since_trim: Arc<Mutex<u32>>,
}

impl CappedFileWriter {
    pub fn new(path: String, max_lines: u32) -> Self {
        Self {
            path,
            max_lines: max_lines.max(1),
            lines_since_trim: Arc::new(Mutex::new(0)),
        }
    }

    fn trim(&self) -> io::Result<()> {
        if !Path::new(&self.path).exists() {
            return Ok(());
        }

        let max = self.max_lines as usize;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(max + 1);
        let mut total = 0usize;
        for line in BufReader::new(File::open(&self.path)?).lines() {
            tail.push_back(line?);
            total += 1;
            if tail.len() > max {
                tail.pop_front();
            }
        }

        if total > max {
            let mut file = File::create(&self.path)?;
            for line in &tail {
                writeln!(file, "{}", line)?;
            }
        }
        Ok(())
    }
}

impl io::Write for CappedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(buf)?;

        let mut pending = self.lines_since_trim.lock();
        *pending += buf.iter().filter(|&&b| b == b'\n').count() as u32;

        // Trimming rereads the whole file, so only do it every tenth of the cap.
        if *pending >= (self.max_lines / 10).max(50) {
            if let Err(e) = self.trim() {
                eprintln!("Failed to trim log file: {}", e);
            }
            *pending = 0;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CappedFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
