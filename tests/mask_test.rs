/*!
 * Mask Controller Tests
 * Save/restore discipline of the thread signal mask
 */

use serial_test::serial;
use sigbridge::{MaskController, PendingInspector, Signal, SignalError, SignalSet};

fn usr1() -> SignalSet {
    SignalSet::of(&[Signal::SIGUSR1])
}

#[test]
#[serial]
fn block_then_restore_round_trip() {
    let before = MaskController::current_mask().unwrap();
    assert!(!before.contains(Signal::SIGUSR1));

    let mut guard = MaskController::block(usr1()).unwrap();
    assert!(MaskController::current_mask()
        .unwrap()
        .contains(Signal::SIGUSR1));
    guard.restore().unwrap();

    assert_eq!(MaskController::current_mask().unwrap(), before);
}

#[test]
#[serial]
fn nested_blocks_restore_in_lifo_order() {
    let before = MaskController::current_mask().unwrap();

    let mut outer = MaskController::block(usr1()).unwrap();
    let mut inner = MaskController::block(SignalSet::of(&[Signal::SIGUSR2])).unwrap();

    let masked = MaskController::current_mask().unwrap();
    assert!(masked.contains(Signal::SIGUSR1));
    assert!(masked.contains(Signal::SIGUSR2));

    inner.restore().unwrap();
    assert!(!MaskController::current_mask()
        .unwrap()
        .contains(Signal::SIGUSR2));

    outer.restore().unwrap();
    assert_eq!(MaskController::current_mask().unwrap(), before);
}

#[test]
#[serial]
fn drop_restores_the_mask() {
    let before = MaskController::current_mask().unwrap();
    {
        let _guard = MaskController::block(usr1()).unwrap();
        assert!(MaskController::current_mask()
            .unwrap()
            .contains(Signal::SIGUSR1));
    }
    assert_eq!(MaskController::current_mask().unwrap(), before);
}

#[test]
#[serial]
fn out_of_order_restore_is_rejected() {
    let mut outer = MaskController::block(usr1()).unwrap();
    let mut inner = MaskController::block(SignalSet::of(&[Signal::SIGUSR2])).unwrap();

    // the outer snapshot is not the innermost live scope
    match outer.restore() {
        Err(SignalError::MaskOperationFailed(_)) => {}
        other => panic!("expected MaskOperationFailed, got {:?}", other),
    }

    inner.restore().unwrap();
    // with the inner scope gone the outer snapshot restores cleanly
    outer.restore().unwrap();
}

#[test]
#[serial]
fn replace_swaps_the_whole_mask() {
    let before = MaskController::current_mask().unwrap();

    let mut guard = MaskController::replace(usr1()).unwrap();
    let masked = MaskController::current_mask().unwrap();
    assert!(masked.contains(Signal::SIGUSR1));
    assert!(!masked.contains(Signal::SIGUSR2));
    guard.restore().unwrap();

    assert_eq!(MaskController::current_mask().unwrap(), before);
}

#[test]
#[serial]
fn blocked_signal_shows_up_pending() {
    // SIGCHLD is ignored by default, so the pending occurrence is discarded
    // on restore instead of acting on the process
    let chld = SignalSet::of(&[Signal::SIGCHLD]);
    let inspector = PendingInspector;

    let mut guard = MaskController::block(chld).unwrap();
    assert!(inspector
        .blocked_signals()
        .unwrap()
        .contains(Signal::SIGCHLD));

    nix::sys::signal::raise(nix::sys::signal::Signal::SIGCHLD).unwrap();
    assert!(inspector
        .pending_signals()
        .unwrap()
        .contains(Signal::SIGCHLD));

    guard.restore().unwrap();
    assert!(!inspector
        .pending_signals()
        .unwrap()
        .contains(Signal::SIGCHLD));
}

#[test]
#[serial]
fn snapshot_reports_prior_mask() {
    let guard = MaskController::block(usr1()).unwrap();
    let prior = guard.snapshot().unwrap().prior_mask();
    assert!(!prior.contains(Signal::SIGUSR1));
}
