//! The side of the protocol that runs inside an interactor program.
//!
//! An interactor is started as `interactor <input> [<output>] [<from_i> <to_i>]...`.
//! Without pipe pairs the single candidate is on stdin/stdout.

use std::{
    fmt,
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use kjudge_stream::{ErrorKind, Side, StreamMode, StreamOptions};

use super::checker::{Source, Stream};
use crate::verdict::{ExitCodeTable, JudgeError, JudgeResult, Verdict, VerdictRecord};

/// The interactor's link to one candidate node.
pub struct NodeChannel {
    id: usize,
    pub from: Stream,
    to: Box<dyn Write + Send>,
}

impl NodeChannel {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Writes one line to the node and flushes it.
    pub fn send(&mut self, line: impl fmt::Display) -> JudgeResult<()> {
        writeln!(self.to, "{}", line)
            .and_then(|_| self.to.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe => {
                    JudgeError::wrong(format!("node {} stopped reading its input", self.id))
                }
                _ => JudgeError::Engine(anyhow::Error::new(e).context(format!("write to node {}", self.id))),
            })
    }
}

pub struct InteractorSession {
    pub input: Stream,
    pub output: Option<BufWriter<File>>,
    pub nodes: Vec<NodeChannel>,
}

impl InteractorSession {
    pub fn from_args<I>(args: I) -> JudgeResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        Self::from_args_with(args, StreamMode::Tokens.options(), StreamMode::Tokens.options())
    }

    pub fn from_args_with<I>(
        args: I,
        input_options: StreamOptions,
        node_options: StreamOptions,
    ) -> JudgeResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let Some((input_path, rest)) = args.split_first() else {
            return Err(JudgeError::fail("usage: interactor <input> [<output>] [<from> <to>]..."));
        };
        let (output_path, pairs) = match rest.len() % 2 {
            1 => (Some(&rest[0]), &rest[1..]),
            _ => (None, rest),
        };

        let input: Source = Box::new(fsutil::open_buffered(input_path)?);
        let input = Stream::new(input, input_options, ErrorKind::Fail, Side::Input);
        let output = match output_path {
            Some(p) => Some(BufWriter::new(fsutil::create_file(p)?)),
            None => None,
        };

        let open_node = |id: usize, from: Source, to: Box<dyn Write + Send>| NodeChannel {
            id,
            from: Stream::new(from, node_options, ErrorKind::ParseError, Side::Output),
            to,
        };
        let nodes = if pairs.is_empty() {
            vec![open_node(
                0,
                Box::new(BufReader::new(io::stdin())),
                Box::new(io::stdout()),
            )]
        } else {
            let mut nodes = Vec::with_capacity(pairs.len() / 2);
            for (id, pair) in pairs.chunks(2).enumerate() {
                // The node opens its write end first; mirror it or both block.
                let from = fsutil::open_buffered(PathBuf::from(&pair[0]))?;
                let to = fsutil::open_for_write(PathBuf::from(&pair[1]))?;
                nodes.push(open_node(id, Box::new(from), Box::new(to)));
            }
            nodes
        };
        log::debug!("Interactor session with {} node(s)", nodes.len());

        Ok(Self {
            input,
            output,
            nodes,
        })
    }

    pub fn node(&mut self, id: usize) -> JudgeResult<&mut NodeChannel> {
        let count = self.nodes.len();
        self.nodes
            .get_mut(id)
            .ok_or_else(|| JudgeError::fail(format!("no node {} (have {})", id, count)))
    }

    /// Finishes every stream. Nodes see end of input before their output is
    /// checked for leftovers.
    pub fn close(self) -> JudgeResult<()> {
        let Self {
            input,
            output,
            nodes,
        } = self;
        if let Some(mut out) = output {
            out.flush().map_err(anyhow::Error::from)?;
        }
        let mut froms = Vec::with_capacity(nodes.len());
        for node in nodes {
            drop(node.to);
            froms.push(node.from);
        }
        input.close()?;
        for from in froms {
            from.close()?;
        }
        Ok(())
    }
}

/// Opens a session from `args`, runs `body` on it and closes it.
pub fn run_session<I, F>(args: I, body: F) -> JudgeResult<f64>
where
    I: IntoIterator<Item = String>,
    F: FnOnce(&mut InteractorSession) -> JudgeResult<f64>,
{
    let mut session = InteractorSession::from_args(args)?;
    let score = body(&mut session)?;
    session.close()?;
    Ok(score)
}

/// Entry point for interactor binaries. The verdict message goes to stderr
/// and the verdict itself becomes the exit status via `exit_codes`.
pub fn run_interactor<F>(exit_codes: &ExitCodeTable, verbose: bool, body: F) -> ExitCode
where
    F: FnOnce(&mut InteractorSession) -> JudgeResult<f64>,
{
    let record = VerdictRecord::from_result(run_session(std::env::args().skip(1), body), verbose);
    if !record.message.is_empty() {
        eprintln!("{}", record.message);
    }
    ExitCode::from(exit_status(exit_codes, record.verdict))
}

fn exit_status(exit_codes: &ExitCodeTable, verdict: Verdict) -> u8 {
    exit_codes
        .code_for(verdict)
        .or_else(|| exit_codes.code_for(Verdict::Fail))
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod test {
    use super::*;

    fn write_input(dir: &tempfile::TempDir, text: &str) -> String {
        let path = dir.path().join("case.in");
        fsutil::write(&path, text).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn reads_input_and_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "7\n");
        let out = dir.path().join("case.out");
        let args = vec![input, out.to_string_lossy().into_owned()];
        let score = run_session(args, |s| {
            let n = s.input.read_int(None)?;
            let w = s.output.as_mut().ok_or_else(|| JudgeError::fail("no output"))?;
            writeln!(w, "{}", n * 2).map_err(anyhow::Error::from)?;
            Ok(1.0)
        })
        .unwrap();
        assert_eq!(score, 1.0);
        assert_eq!(fsutil::read_to_string(&out).unwrap(), "14\n");
    }

    #[test]
    fn leftover_input_is_a_judge_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "7 8\n");
        let out = dir.path().join("case.out");
        let args = vec![input, out.to_string_lossy().into_owned()];
        let e = run_session(args, |s| {
            s.input.read_int(None)?;
            Ok(1.0)
        })
        .unwrap_err();
        assert_eq!(e.verdict(), Verdict::Fail);
        assert_eq!(e.to_string(), "input line 1 col 3: extra characters found at the end");
    }

    #[test]
    fn missing_arguments_fail() {
        assert_eq!(
            run_session(Vec::<String>::new(), |_| Ok(1.0)).unwrap_err().verdict(),
            Verdict::Fail
        );
    }

    #[test]
    fn unmapped_verdicts_use_the_fail_code() {
        let table = ExitCodeTable::new([(Verdict::Accepted, 0), (Verdict::Fail, 3)]).unwrap();
        assert_eq!(exit_status(&table, Verdict::Accepted), 0);
        assert_eq!(exit_status(&table, Verdict::Wrong), 3);
        assert_eq!(exit_status(&ExitCodeTable::default(), Verdict::Wrong), 1);
    }

    #[test]
    fn fifo_pairs_follow_the_opening_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "5\n");
        let from = fsutil::create_fifo(dir.path().join("n0.out")).unwrap();
        let to = fsutil::create_fifo(dir.path().join("n0.in")).unwrap();

        let (node_from, node_to) = (from.clone(), to.clone());
        let node = std::thread::spawn(move || {
            use std::io::{BufRead, Write};
            let mut w = File::options().write(true).open(node_from).unwrap();
            let mut r = BufReader::new(File::open(node_to).unwrap());
            let mut line = String::new();
            r.read_line(&mut line).unwrap();
            let v: i64 = line.trim().parse().unwrap();
            writeln!(w, "{}", v + 1).unwrap();
        });

        let args = vec![
            input,
            from.to_string_lossy().into_owned(),
            to.to_string_lossy().into_owned(),
        ];
        let score = run_session(args, |s| {
            let v = s.input.read_int(None)?;
            let node = s.node(0)?;
            node.send(v)?;
            let got = node.from.read_int(None)?;
            if got == v + 1 {
                Ok(1.0)
            } else {
                Err(JudgeError::wrong(format!("expected {}, got {}", v + 1, got)))
            }
        })
        .unwrap();
        node.join().unwrap();
        assert_eq!(score, 1.0);
    }
}
