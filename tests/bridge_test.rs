/*!
 * Bridge Lifecycle Tests
 * Install/uninstall round-trips against real kernel state
 */

use serial_test::serial;
use sigbridge::{
    install, installed_signals, uninstall, InstallOptions, MaskController, PendingInspector, Recv,
    Signal, SignalDisposition, SignalError, SignalSet,
};
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn usr1() -> SignalSet {
    SignalSet::of(&[Signal::SIGUSR1])
}

fn replace() -> InstallOptions {
    InstallOptions {
        replace: true,
        ..InstallOptions::default()
    }
}

fn raise(sig: i32) {
    nix::sys::signal::raise(nix::sys::signal::Signal::try_from(sig).unwrap()).unwrap();
}

#[test]
#[serial]
fn duplicate_install_is_rejected_without_replace() {
    init_logging();
    let channel = install(usr1(), InstallOptions::default()).unwrap();

    assert_eq!(
        install(usr1(), InstallOptions::default()).map(|_| ()),
        Err(SignalError::AlreadyInstalled(Signal::SIGUSR1))
    );
    // the first installation is untouched
    assert!(installed_signals().contains(Signal::SIGUSR1));
    assert!(!channel.is_closed());

    uninstall(Signal::SIGUSR1).unwrap();
}

#[test]
#[serial]
fn replace_moves_capture_to_the_new_channel() {
    init_logging();
    let first = install(usr1(), InstallOptions::default()).unwrap();
    let second = install(usr1(), replace()).unwrap();

    // the displaced channel lost its only signal
    assert!(first.is_closed());
    assert_eq!(
        first.receive(Some(Duration::ZERO)),
        Err(SignalError::ChannelClosed)
    );

    raise(10);
    match second.receive(Some(Duration::from_secs(1))).unwrap() {
        Recv::Event(event) => assert_eq!(event.signal, Signal::SIGUSR1),
        Recv::Timeout => panic!("expected the replacement channel to capture"),
    }

    uninstall(Signal::SIGUSR1).unwrap();
}

#[test]
#[serial]
fn uninstall_restores_the_pre_install_disposition() {
    init_logging();
    let inspector = PendingInspector;
    assert_eq!(
        inspector.disposition(Signal::SIGUSR1).unwrap(),
        SignalDisposition::Default
    );

    let _channel = install(usr1(), InstallOptions::default()).unwrap();
    assert_eq!(
        inspector.disposition(Signal::SIGUSR1).unwrap(),
        SignalDisposition::Handler
    );
    assert!(installed_signals().contains(Signal::SIGUSR1));

    uninstall(Signal::SIGUSR1).unwrap();
    assert_eq!(
        inspector.disposition(Signal::SIGUSR1).unwrap(),
        SignalDisposition::Default
    );
    assert!(!installed_signals().contains(Signal::SIGUSR1));
}

#[test]
#[serial]
fn uninstall_closes_the_channel_with_its_last_signal() {
    init_logging();
    let set = SignalSet::of(&[Signal::SIGUSR1, Signal::SIGUSR2]);
    let channel = install(set, InstallOptions::default()).unwrap();

    uninstall(Signal::SIGUSR1).unwrap();
    assert!(!channel.is_closed());

    uninstall(Signal::SIGUSR2).unwrap();
    assert!(channel.is_closed());
    assert_eq!(
        channel.receive(Some(Duration::ZERO)),
        Err(SignalError::ChannelClosed)
    );
}

#[test]
#[serial]
fn uncatchable_signals_cannot_be_installed() {
    init_logging();
    assert_eq!(
        install(SignalSet::of(&[Signal::SIGKILL]), InstallOptions::default()).map(|_| ()),
        Err(SignalError::InvalidSignal(9))
    );
    assert!(!installed_signals().contains(Signal::SIGKILL));
}

#[test]
#[serial]
fn empty_install_is_rejected() {
    init_logging();
    match install(SignalSet::empty(), InstallOptions::default()) {
        Err(SignalError::InstallFailed(_)) => {}
        other => panic!("expected InstallFailed, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn uninstalling_an_uninstalled_signal_is_a_no_op() {
    init_logging();
    uninstall(Signal::SIGUSR1).unwrap();
}

#[test]
#[serial]
fn masked_capture_goes_pending_then_drains_on_restore() {
    init_logging();
    let inspector = PendingInspector;
    let channel = install(SignalSet::of(&[Signal::SIGUSR2]), InstallOptions::default()).unwrap();

    let mut guard = MaskController::block(SignalSet::of(&[Signal::SIGUSR2])).unwrap();
    raise(12);

    // masked, so the kernel holds it pending and the capture has not run
    assert!(inspector
        .pending_signals()
        .unwrap()
        .contains(Signal::SIGUSR2));
    assert_eq!(channel.try_receive().unwrap(), None);

    // restoring the mask delivers the pending occurrence to the capture
    guard.restore().unwrap();
    match channel.receive(Some(Duration::from_secs(1))).unwrap() {
        Recv::Event(event) => assert_eq!(event.signal, Signal::SIGUSR2),
        Recv::Timeout => panic!("expected the pending occurrence to deliver"),
    }

    uninstall(Signal::SIGUSR2).unwrap();
}
