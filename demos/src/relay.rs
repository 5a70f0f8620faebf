//! Every node gets one number from the input and must send back its id and
//! the doubled number.

use kjudge_core::{
    harness::InteractorSession,
    verdict::{JudgeError, JudgeResult},
};

pub fn play(s: &mut InteractorSession) -> JudgeResult<f64> {
    for id in 0..s.nodes.len() {
        let x = s.input.read_int(None)?;
        let node = s.node(id)?;
        node.send(x)?;
        let got_id = node.from.read_int(None)?;
        let got = node.from.read_int(None)?;
        if got_id != id as i64 {
            return Err(JudgeError::wrong(format!("node {} claims to be node {}", id, got_id)));
        }
        if got != 2 * x {
            return Err(JudgeError::wrong(format!("node {}: expected {}, found {}", id, 2 * x, got)));
        }
    }
    Ok(1.0)
}
