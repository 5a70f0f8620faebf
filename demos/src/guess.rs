//! Guess the target: the candidate gets the number of moves, then each move
//! is `ask <v>` (answered with `target - v`) or `answer <v>`.

use kjudge_core::{
    bounds::{var, BoundsMap},
    harness::InteractorSession,
    verdict::{JudgeError, JudgeResult},
};

pub const MAX_ABS: i64 = 1_000_000_000;

pub fn bounds() -> BoundsMap {
    BoundsMap::new()
        .with("v", var().abs().le(MAX_ABS))
        .with("moves", var().ge(1i64).le(100))
}

pub fn play(s: &mut InteractorSession) -> JudgeResult<f64> {
    let bounds = bounds();
    let target = s.input.read_int(Some(bounds.int("v")?))?;
    let moves = s.input.read_int(Some(bounds.int("moves")?))?;

    let node = s.node(0)?;
    node.send(moves)?;
    for turn in 1..=moves {
        let cmd = node.from.read_token()?;
        let v = node.from.read_int(None)?;
        bounds.check_int("v", v)?;
        match cmd.as_str() {
            "ask" => node.send(target - v)?,
            "answer" if v == target => {
                log::debug!("Answered in {} move(s)", turn);
                return Ok(1.0);
            }
            "answer" => {
                return Err(JudgeError::wrong(format!(
                    "answered {}, but the target is {}",
                    v, target
                )))
            }
            other => return Err(JudgeError::parse_error(format!("unknown command {:?}", other))),
        }
    }
    Err(JudgeError::wrong(format!("no correct answer within {} moves", moves)))
}
