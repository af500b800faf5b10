use proptest::prelude::*;

use idfexp::config::Settings;
use idfexp::script::expand::expand_env_with;
use idfexp::script::loops::{LoopFrame, LoopStack};
use idfexp::script::stmt::{find_matching_endfor, join_continuations};
use idfexp::script::Interpreter;

proptest! {
    /// `FOR i=a TO b` with an empty body runs `max(0, b-a+1)` times and
    /// always terminates.
    #[test]
    fn loop_runs_exact_iterate_count(start in -20i64..20, end in -20i64..20) {
        let script = format!("N=0\nFOR i={start} TO {end}\n  N = N + 1\nENDFOR\n");
        let mut interp = Interpreter::new(Settings::new());
        interp.run_str(&script).unwrap();
        let n = interp.variables().value("N").unwrap().as_scalar().unwrap();
        prop_assert_eq!(n as i64, (end - start + 1).max(0));
    }

    /// Loop substitution returns Ok or Err on any input, never panics.
    #[test]
    fn substitution_does_not_panic(s in "\\PC*", value in -1000i64..1000) {
        let mut stack = LoopStack::new();
        stack.push(LoopFrame::new("i", value, value, 0).unwrap().unwrap());
        let _ = stack.substitute(&s);
    }

    /// Text without `%%` passes through substitution unchanged.
    #[test]
    fn substitution_leaves_plain_text(s in "[^%]*") {
        let mut stack = LoopStack::new();
        stack.push(LoopFrame::new("i", 1, 3, 0).unwrap().unwrap());
        let substituted = stack.substitute(&s).unwrap();
        prop_assert_eq!(substituted.as_ref(), s.as_str());
    }

    /// Expansion with no defined variables is the identity.
    #[test]
    fn env_expansion_without_variables_is_identity(s in "\\PC*") {
        prop_assert_eq!(expand_env_with(&s, |_| None), s);
    }

    /// Skipping an empty loop lands on its own ENDFOR however deep the
    /// nesting inside it.
    #[test]
    fn skip_scan_balances_nesting(depth in 1usize..8, body_lines in 0usize..4) {
        let mut src = String::from("FOR i=1 TO 0\n");
        for d in 0..depth {
            src.push_str(&format!("FOR j{d}=1 TO 2\n"));
            for _ in 0..body_lines {
                src.push_str("X = 1\n");
            }
        }
        for _ in 0..depth {
            src.push_str("ENDFOR\n");
        }
        src.push_str("ENDFOR\nY = 2\n");
        let lines = join_continuations(&src);
        let close = find_matching_endfor(&lines, 0).unwrap();
        prop_assert_eq!(close, lines.len() - 2);
    }
}
