//! End-to-end shaping scenarios: a compiled policy applied to a realistic
//! frame mix, including a live policy reload.

use std::sync::Arc;

use canwarden_policy::{compile, Policy};
use canwarden_shaper::{DropCause, PolicyHandle, Shaper, Verdict};

fn policy(yaml: &str) -> Policy {
    let doc: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    compile(&doc).unwrap()
}

#[test]
fn mixed_traffic_is_shaped_per_identifier() {
    let mut shaper = Shaper::new(
        Arc::new(policy(
            r#"
limits:
  "0x7DF": { rate: 10, burst: 2 }
actions:
  drop:  [ "0x666" ]
  remap: [ { from: "0x456", to: "0x457" } ]
"#,
        )),
        0.0,
    );

    // 100 Hz of diagnostic requests: burst of 2, then one admit per 100ms.
    let mut admitted_7df = 0u32;
    for i in 0..100 {
        let now = f64::from(i) * 0.01;
        if shaper.decide(0x7DF, now) == (Verdict::Admit { id: 0x7DF }) {
            admitted_7df += 1;
        }
    }
    // Burst (2) + ~1 refill per 0.1s over ~1s of traffic.
    assert!(
        (10..=13).contains(&admitted_7df),
        "admitted {admitted_7df} of 100"
    );

    // Blocked identifier: always dropped, at any rate.
    for i in 0..10 {
        assert_eq!(
            shaper.decide(0x666, 1.0 + f64::from(i)),
            Verdict::Drop(DropCause::Blocked)
        );
    }

    // Remapped identifier: admitted under the target, unlimited.
    assert_eq!(shaper.decide(0x456, 2.0), Verdict::Admit { id: 0x457 });

    // Background traffic with no rules: untouched.
    assert_eq!(shaper.decide(0x100, 2.0), Verdict::Admit { id: 0x100 });

    let stats = shaper.stats();
    assert_eq!(stats.dropped_blocked, 10);
    assert_eq!(stats.remapped, 1);
    assert_eq!(stats.admitted, u64::from(admitted_7df) + 2);
    assert_eq!(
        stats.dropped_rate,
        u64::from(100 - admitted_7df),
        "every non-admitted 0x7DF frame was rate-limited"
    );
}

#[test]
fn reload_publishes_a_new_policy_without_disturbing_readers() {
    let handle = PolicyHandle::new(policy("actions:\n  drop: [ \"0x111\" ]\n"));

    // A shaping session starts against the current snapshot.
    let mut old_shaper = Shaper::new(handle.snapshot(), 0.0);
    assert_eq!(
        old_shaper.decide(0x111, 0.0),
        Verdict::Drop(DropCause::Blocked)
    );

    // Operator reloads with a different drop set.
    handle.store(policy("actions:\n  drop: [ \"0x222\" ]\n"));

    // The in-flight session still runs the old policy in full.
    assert_eq!(
        old_shaper.decide(0x111, 1.0),
        Verdict::Drop(DropCause::Blocked)
    );
    assert_eq!(old_shaper.decide(0x222, 1.0), Verdict::Admit { id: 0x222 });

    // A new session built from a fresh snapshot sees only the new policy.
    let mut new_shaper = Shaper::new(handle.snapshot(), 1.0);
    assert_eq!(new_shaper.decide(0x111, 1.0), Verdict::Admit { id: 0x111 });
    assert_eq!(
        new_shaper.decide(0x222, 1.0),
        Verdict::Drop(DropCause::Blocked)
    );
}

#[test]
fn failed_reload_leaves_the_old_policy_in_effect() {
    let handle = PolicyHandle::new(policy("actions:\n  drop: [ \"0x111\" ]\n"));

    // A bad document fails to compile; the caller never stores anything.
    let bad: serde_yaml::Value =
        serde_yaml::from_str("limits:\n  \"0x100\": { rate: -1 }\n").unwrap();
    assert!(compile(&bad).is_err());

    assert!(handle.snapshot().drop.contains(&0x111));
}
