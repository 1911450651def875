//! Column-addition problems and their solution traces
//!
//! A trace records the actions taken while adding two numbers right to left:
//! - `A` one-digit addition without an incoming carry
//! - `B` one-digit addition with an incoming carry
//! - `C` writing a carry
//! - `D` bringing down the final carry

use std::collections::BTreeMap;

use rand::Rng;
use tracing::info;
use zpd_algo::{Problem, Trace};

pub const ADD: char = 'A';
pub const ADD_WITH_CARRY: char = 'B';
pub const WRITE_CARRY: char = 'C';
pub const BRING_DOWN_CARRY: char = 'D';

/// Sum of `op1` and `op2` with the trace of adding their absolute values
pub fn addition_trace(op1: i64, op2: i64) -> (i64, Trace) {
    let sum = op1 + op2;
    let mut left = op1.unsigned_abs();
    let mut right = op2.unsigned_abs();

    let mut trace = Trace::new();
    let mut carry = 0;
    loop {
        trace.push(if carry == 0 { ADD } else { ADD_WITH_CARRY });

        let digits = left % 10 + right % 10 + carry;
        carry = digits / 10;
        if carry > 0 {
            trace.push(WRITE_CARRY);
        }

        left /= 10;
        right /= 10;
        if left == 0 && right == 0 {
            break;
        }
    }
    if carry > 0 {
        trace.push(BRING_DOWN_CARRY);
    }

    (sum, trace)
}

/// Operand range for `digits`-long numbers; one-digit operands include 0
pub fn operand_range(digits: u32) -> std::ops::Range<i64> {
    let upper = 10i64.pow(digits);
    let lower = if digits <= 1 { 0 } else { 10i64.pow(digits - 1) };
    lower..upper
}

/// `count` random operand pairs per operand length, each turned into a problem
pub fn generate_problems<R: Rng + ?Sized>(digit_counts: &BTreeMap<u32, usize>, rng: &mut R) -> Vec<Problem> {
    let mut problems = Vec::new();

    for (&digits, &count) in digit_counts {
        let range = operand_range(digits);
        for _ in 0..count {
            let op1 = rng.gen_range(range.clone());
            let op2 = rng.gen_range(range.clone());
            let (sum, trace) = addition_trace(op1, op2);
            problems.push(Problem::new(op1, op2, sum, trace));
        }
        info!(digits, count, "generated addition problems");
    }

    problems
}
