use std::io::BufRead;

use async_trait::async_trait;
use kjudge_bounds::IntervalSet;
use kjudge_stream::{ErrorKind, Side, StreamOptions, StrictStream};

use super::{aggregate::Aggregate, CaseFiles, HarnessError, JudgeStep};
use crate::verdict::{JudgeError, JudgeResult, VerdictRecord};

pub type Source = Box<dyn BufRead + Send>;
pub type Stream = StrictStream<Source>;

type ReadInput<I> = Box<dyn FnMut(&mut Stream) -> JudgeResult<I> + Send>;
type ReadFor<I, T> = Box<dyn FnMut(&mut Stream, &I) -> JudgeResult<T> + Send>;
type Score<I, O, J> = Box<dyn FnMut(&I, &O, &J) -> JudgeResult<f64> + Send>;

/// How many cases one input file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseCount {
    #[default]
    Single,
    /// The input starts with a line holding the count.
    Leading,
    Fixed(usize),
}

/// Collects the named steps of a checker. [`CheckerBuilder::build`] refuses to
/// produce a [`Checker`] until every required step is present.
pub struct CheckerBuilder<I, O, J> {
    get_one_input: Option<ReadInput<I>>,
    get_output_for_input: Option<ReadFor<I, O>>,
    get_judge_data_for_input: Option<ReadFor<I, J>>,
    score_one: Option<Score<I, O, J>>,
    cases: CaseCount,
    aggregate: Aggregate,
    input_options: StreamOptions,
    output_options: StreamOptions,
    judge_options: StreamOptions,
    require_input: bool,
    verbose: bool,
}

impl<I, O, J: Default> Default for CheckerBuilder<I, O, J> {
    fn default() -> Self {
        Self {
            get_one_input: None,
            get_output_for_input: None,
            get_judge_data_for_input: None,
            score_one: None,
            cases: CaseCount::Single,
            aggregate: Aggregate::Minimum,
            input_options: StreamOptions::default(),
            output_options: StreamOptions::default(),
            judge_options: StreamOptions::default(),
            require_input: true,
            verbose: false,
        }
    }
}

impl<I, O, J: Default> CheckerBuilder<I, O, J> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_one_input(mut self, f: impl FnMut(&mut Stream) -> JudgeResult<I> + Send + 'static) -> Self {
        self.get_one_input = Some(Box::new(f));
        self
    }

    pub fn get_output_for_input(
        mut self,
        f: impl FnMut(&mut Stream, &I) -> JudgeResult<O> + Send + 'static,
    ) -> Self {
        self.get_output_for_input = Some(Box::new(f));
        self
    }

    pub fn get_judge_data_for_input(
        mut self,
        f: impl FnMut(&mut Stream, &I) -> JudgeResult<J> + Send + 'static,
    ) -> Self {
        self.get_judge_data_for_input = Some(Box::new(f));
        self
    }

    pub fn score_one(mut self, f: impl FnMut(&I, &O, &J) -> JudgeResult<f64> + Send + 'static) -> Self {
        self.score_one = Some(Box::new(f));
        self
    }

    pub fn cases(mut self, cases: CaseCount) -> Self {
        self.cases = cases;
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn input_options(mut self, options: impl Into<StreamOptions>) -> Self {
        self.input_options = options.into();
        self
    }

    pub fn output_options(mut self, options: impl Into<StreamOptions>) -> Self {
        self.output_options = options.into();
        self
    }

    pub fn judge_options(mut self, options: impl Into<StreamOptions>) -> Self {
        self.judge_options = options.into();
        self
    }

    /// Whether every case must find unread input before `get_one_input`
    /// runs. Turn it off for checkers that never read the input.
    pub fn require_input(mut self, yes: bool) -> Self {
        self.require_input = yes;
        self
    }

    pub fn verbose(mut self, yes: bool) -> Self {
        self.verbose = yes;
        self
    }

    pub fn build(self) -> Result<Checker<I, O, J>, HarnessError> {
        Ok(Checker {
            get_one_input: self
                .get_one_input
                .ok_or(HarnessError::MissingStep("get_one_input"))?,
            get_output_for_input: self
                .get_output_for_input
                .ok_or(HarnessError::MissingStep("get_output_for_input"))?,
            get_judge_data_for_input: self.get_judge_data_for_input,
            score_one: self.score_one.ok_or(HarnessError::MissingStep("score_one"))?,
            cases: self.cases,
            aggregate: self.aggregate,
            input_options: self.input_options,
            output_options: self.output_options,
            judge_options: self.judge_options,
            require_input: self.require_input,
            verbose: self.verbose,
        })
    }
}

/// A checker assembled from named steps. Per case it reads one input, the
/// candidate's output for it, the judge data for it (when a reader is set),
/// and scores them; the case scores are then aggregated.
pub struct Checker<I, O, J> {
    get_one_input: ReadInput<I>,
    get_output_for_input: ReadFor<I, O>,
    get_judge_data_for_input: Option<ReadFor<I, J>>,
    score_one: Score<I, O, J>,
    cases: CaseCount,
    aggregate: Aggregate,
    input_options: StreamOptions,
    output_options: StreamOptions,
    judge_options: StreamOptions,
    require_input: bool,
    verbose: bool,
}

fn ensure_more(stream: &mut Stream) -> JudgeResult<()> {
    if stream.at_end()? {
        Err(JudgeError::exhausted(stream.side()))
    } else {
        Ok(())
    }
}

impl<I, O, J: Default> Checker<I, O, J> {
    pub fn uses_judge_data(&self) -> bool {
        self.get_judge_data_for_input.is_some()
    }

    pub fn check(&mut self, input: Source, output: Source, judge: Option<Source>) -> JudgeResult<f64> {
        let mut input = Stream::new(input, self.input_options, ErrorKind::Fail, Side::Input);
        let mut output = Stream::new(output, self.output_options, ErrorKind::ParseError, Side::Output);
        let mut judge = match (judge, self.uses_judge_data()) {
            (Some(src), true) => Some(Stream::new(src, self.judge_options, ErrorKind::Fail, Side::Judge)),
            (None, true) => return Err(JudgeError::fail("judge data is required but missing")),
            (_, false) => None,
        };

        let count = match self.cases {
            CaseCount::Single => 1,
            CaseCount::Fixed(n) => n,
            CaseCount::Leading => {
                ensure_more(&mut input)?;
                let n = input.read_int(Some(&IntervalSet::at_least(0)))?;
                if !input.options().token_skip_terminators {
                    input.read_eoln()?;
                }
                n as usize
            }
        };

        let mut scores = Vec::with_capacity(count);
        for case in 1..=count {
            log::trace!("Checking case {}/{}", case, count);
            if self.require_input {
                ensure_more(&mut input)?;
            }
            let i = (self.get_one_input)(&mut input)?;

            ensure_more(&mut output)?;
            let o = (self.get_output_for_input)(&mut output, &i)?;

            let j = match (&mut self.get_judge_data_for_input, judge.as_mut()) {
                (Some(read), Some(stream)) => {
                    ensure_more(stream)?;
                    read(stream, &i)?
                }
                _ => J::default(),
            };

            scores.push(Some((self.score_one)(&i, &o, &j)?));
        }

        input.close()?;
        if let Some(judge) = judge {
            judge.close()?;
        }
        output.close()?;

        self.aggregate.apply(&scores)
    }

    pub fn check_files(&mut self, files: &CaseFiles) -> VerdictRecord {
        let result = self.open_and_check(files);
        VerdictRecord::from_result(result, self.verbose)
    }

    fn open_and_check(&mut self, files: &CaseFiles) -> JudgeResult<f64> {
        let input: Source = Box::new(fsutil::open_buffered(&files.input)?);
        let output: Source = Box::new(fsutil::open_buffered(&files.output)?);
        let judge = match (&files.judge, self.uses_judge_data()) {
            (Some(path), true) => Some(Box::new(fsutil::open_buffered(path)?) as Source),
            _ => None,
        };
        self.check(input, output, judge)
    }
}

#[async_trait]
impl<I, O, J> JudgeStep for Checker<I, O, J>
where
    I: Send,
    O: Send,
    J: Default + Send,
{
    async fn judge(&mut self, files: &CaseFiles) -> VerdictRecord {
        self.check_files(files)
    }
}
