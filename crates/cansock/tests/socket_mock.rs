//! Socket lifecycle tests against the mock transport

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cansock::config::{MockConfig, MockInterfaceConfig};
use cansock::transport::mock::{MockOp, MockTransport, SentFrame};
use cansock::{
    BusTransport, CanFrame, CanId, CanInterface, CanSocket, CanSocketError, FrameKind, RawFrame,
    SocketMode, SocketOption, SocketState, TransportError, ALL_INTERFACES,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn mock() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(&MockConfig {
        interfaces: vec![
            MockInterfaceConfig {
                name: "can0".into(),
                index: 3,
                mtu: 16,
            },
            MockInterfaceConfig {
                name: "canfd0".into(),
                index: 5,
                mtu: 72,
            },
            MockInterfaceConfig {
                name: "weird0".into(),
                index: 7,
                mtu: 1500,
            },
        ],
    }))
}

fn open(mock: &Arc<MockTransport>, mode: SocketMode) -> CanSocket {
    let transport: Arc<dyn BusTransport> = mock.clone();
    CanSocket::open(transport, mode).unwrap()
}

#[test]
fn test_raw_and_bcm_create() {
    let mock = mock();
    let mut raw = open(&mock, SocketMode::Raw);
    let mut bcm = open(&mock, SocketMode::Bcm);

    assert_eq!(raw.mode(), SocketMode::Raw);
    assert_eq!(bcm.mode(), SocketMode::Bcm);
    assert_eq!(mock.mode(raw.handle()), Some(SocketMode::Raw));
    assert_eq!(mock.mode(bcm.handle()), Some(SocketMode::Bcm));
    assert_eq!(raw.state(), SocketState::Open);

    raw.close().unwrap();
    bcm.close().unwrap();
    assert!(!mock.is_open(raw.handle()));
    assert!(!mock.is_open(bcm.handle()));
}

#[test]
fn test_open_failure() {
    let mock = mock();
    mock.fail_next(
        MockOp::Open,
        TransportError::Io(io::Error::new(io::ErrorKind::Other, "address family not supported")),
    );
    let transport: Arc<dyn BusTransport> = mock.clone();
    let err = CanSocket::open(transport, SocketMode::Bcm).unwrap_err();
    assert!(matches!(
        err,
        CanSocketError::Open {
            mode: SocketMode::Bcm,
            ..
        }
    ));
}

#[test]
fn test_send_scenario() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);

    let can0 = CanInterface::lookup(&socket, "can0").unwrap();
    assert_eq!(can0.index(), 3);
    assert_eq!(can0.name(), Some("can0"));

    socket.bind(&can0).unwrap();
    let id = CanId::new(0x30001).set_eff();
    let frame = CanFrame::new(can0, id, vec![0x00, 0x91]).unwrap();
    socket.send(&frame).unwrap();

    assert_eq!(
        mock.sent_frames(),
        vec![SentFrame {
            handle: socket.handle(),
            frame: RawFrame {
                ifindex: 3,
                can_id: 0x8003_0001,
                data: vec![0x00, 0x91],
                kind: FrameKind::Classic,
            },
        }]
    );
    let sent = CanId::new(mock.sent_frames()[0].frame.can_id);
    assert!(sent.is_extended());
    assert_eq!(sent.extended_address(), 0x30001);
}

#[test]
fn test_each_operation_is_one_transport_call() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    assert_eq!(mock.total_calls(), 1);

    socket.bind(&CanInterface::from_index(3)).unwrap();
    assert_eq!(mock.total_calls(), 2);

    let frame = CanFrame::new(CanInterface::from_index(3), CanId::new(0x5), [0u8; 8]).unwrap();
    socket.send(&frame).unwrap();
    assert_eq!(mock.total_calls(), 3);

    socket.set_loopback(true).unwrap();
    socket.loopback().unwrap();
    assert_eq!(mock.total_calls(), 5);

    socket.mtu("can0").unwrap();
    assert_eq!(mock.total_calls(), 6);

    socket.close().unwrap();
    assert_eq!(mock.total_calls(), 7);
}

#[test]
fn test_rebind_last_bind_wins() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    let can0 = CanInterface::lookup(&socket, "can0").unwrap();

    socket.bind(&ALL_INTERFACES).unwrap();
    assert_eq!(socket.bound_interface(), Some(&ALL_INTERFACES));

    socket.bind(&can0).unwrap();
    assert_eq!(socket.bound_interface(), Some(&can0));
    assert_eq!(socket.state(), SocketState::Bound(can0.clone()));
    assert_eq!(mock.bound_index(socket.handle()), Some(3));

    // a frame addressed to the wildcard goes out on the bound interface
    let frame = CanFrame::new(ALL_INTERFACES, CanId::new(0x123), vec![1, 2, 3]).unwrap();
    socket.send(&frame).unwrap();
    assert_eq!(mock.sent_frames()[0].frame.ifindex, 3);
    assert_eq!(
        mock.binds(),
        vec![(socket.handle(), 0), (socket.handle(), 3)]
    );
}

#[test]
fn test_bind_failure_keeps_previous_binding() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    socket.bind(&CanInterface::from_index(3)).unwrap();

    let err = socket.bind(&CanInterface::from_index(42)).unwrap_err();
    assert!(matches!(err, CanSocketError::Bind { index: 42, .. }));
    assert_eq!(
        socket.bound_interface().map(CanInterface::index),
        Some(3)
    );
}

#[test]
fn test_lookup_unknown_interface() {
    let mock = mock();
    let socket = open(&mock, SocketMode::Raw);
    let err = CanInterface::lookup(&socket, "nope0").unwrap_err();
    match err {
        CanSocketError::InterfaceNotFound { name, .. } => assert_eq!(name, "nope0"),
        other => panic!("Expected InterfaceNotFound, got {:?}", other),
    }
}

#[test]
fn test_resolve_name_best_effort() {
    let mock = mock();
    let socket = open(&mock, SocketMode::Raw);

    let resolved = CanInterface::from_index(5).resolved(&socket);
    assert_eq!(resolved, CanInterface::with_name(5, "canfd0"));

    let unknown = CanInterface::from_index(99);
    assert_eq!(unknown.resolved(&socket), unknown);

    mock.fail_next(MockOp::ResolveName, TransportError::Closed);
    let bare = CanInterface::from_index(3);
    assert_eq!(bare.resolved(&socket).name(), None);

    let calls = mock.calls(MockOp::ResolveName);
    assert_eq!(ALL_INTERFACES.resolved(&socket), ALL_INTERFACES);
    assert_eq!(mock.calls(MockOp::ResolveName), calls);
}

#[test]
fn test_recv_returns_unnamed_interface() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    socket.bind(&ALL_INTERFACES).unwrap();

    mock.push_frame(
        socket.handle(),
        RawFrame {
            ifindex: 3,
            can_id: 0x8003_0001,
            data: vec![0x00, 0x91],
            kind: FrameKind::Classic,
        },
    );

    let frame = socket.recv().unwrap();
    assert_eq!(frame.interface(), &CanInterface::from_index(3));
    assert_eq!(frame.id(), CanId::new(0x30001).set_eff());
    assert_eq!(frame.data(), &[0x00, 0x91]);
    assert_eq!(
        frame.interface().resolved(&socket).name(),
        Some("can0")
    );
}

#[test]
fn test_recv_failure() {
    let mock = mock();
    let socket = open(&mock, SocketMode::Raw);
    mock.fail_next(
        MockOp::Recv,
        TransportError::MalformedFrame("invalid length of received frame: 3".into()),
    );
    assert!(matches!(
        socket.recv(),
        Err(CanSocketError::Receive(TransportError::MalformedFrame(_)))
    ));
}

#[test]
fn test_send_failure_is_not_retried() {
    let mock = mock();
    let socket = open(&mock, SocketMode::Raw);
    mock.fail_next(
        MockOp::Send,
        TransportError::Io(io::Error::new(io::ErrorKind::WouldBlock, "no buffer space")),
    );
    let frame =
        CanFrame::new(CanInterface::from_index(3), CanId::new(0x1), Vec::<u8>::new()).unwrap();
    assert!(matches!(socket.send(&frame), Err(CanSocketError::Send(_))));
    assert_eq!(mock.calls(MockOp::Send), 1);
    assert!(mock.sent_frames().is_empty());
}

#[test]
fn test_closer_unblocks_pending_recv() {
    let mock = mock();
    let socket = open(&mock, SocketMode::Raw);
    let closer = socket.closer();

    let receiver = thread::spawn(move || {
        let result = socket.recv();
        (result, socket)
    });

    while mock.calls(MockOp::Recv) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    closer.close().unwrap();

    let (result, mut socket) = receiver.join().unwrap();
    assert!(matches!(
        result,
        Err(CanSocketError::Receive(TransportError::Closed))
    ));
    assert!(socket.is_closed());
    assert_eq!(socket.state(), SocketState::Closed);
    assert!(matches!(socket.close(), Err(CanSocketError::AlreadyClosed)));
    assert!(matches!(closer.close(), Err(CanSocketError::AlreadyClosed)));

    drop(socket);
    assert_eq!(mock.calls(MockOp::Close), 1);
}

#[test]
fn test_closed_socket_leaves_later_socket_alone() {
    let mock = mock();
    let mut first = open(&mock, SocketMode::Raw);
    first.bind(&CanInterface::from_index(3)).unwrap();
    first.closer().close().unwrap();

    let second = open(&mock, SocketMode::Raw);
    assert_ne!(first.handle(), second.handle());

    let frame = CanFrame::new(CanInterface::from_index(3), CanId::new(0x10), [1u8]).unwrap();
    assert!(matches!(
        first.send(&frame),
        Err(CanSocketError::AlreadyClosed)
    ));
    assert!(matches!(
        first.set_loopback(false),
        Err(CanSocketError::AlreadyClosed)
    ));
    drop(first);

    assert!(mock.is_open(second.handle()));
    assert!(mock.sent_frames().is_empty());
    assert_eq!(mock.calls(MockOp::Close), 1);
}

#[test]
fn test_handle_released_by_transport_stays_released() {
    let mock = mock();
    let first = open(&mock, SocketMode::Raw);
    mock.close(first.handle()).unwrap();

    let second = open(&mock, SocketMode::Raw);
    assert_ne!(first.handle(), second.handle());

    let frame = CanFrame::new(CanInterface::from_index(3), CanId::new(0x10), [1u8]).unwrap();
    assert!(matches!(
        first.send(&frame),
        Err(CanSocketError::Send(TransportError::Closed))
    ));
    drop(first);

    assert!(mock.is_open(second.handle()));
    assert!(mock.sent_frames().is_empty());
}

#[rstest]
#[case(SocketOption::Loopback)]
#[case(SocketOption::RecvOwnMsgs)]
#[case(SocketOption::FdFrames)]
fn test_option_round_trip(#[case] option: SocketOption) {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    let original = socket.option(option).unwrap();

    socket.set_option(option, true).unwrap();
    assert!(socket.option(option).unwrap());
    socket.set_option(option, false).unwrap();
    assert!(!socket.option(option).unwrap());

    for _ in 0..5 {
        let current = socket.option(option).unwrap();
        socket.set_option(option, !current).unwrap();
        assert_eq!(socket.option(option).unwrap(), !current);
    }

    socket.set_option(option, !original).unwrap();
    socket.set_option(option, original).unwrap();
    assert_eq!(socket.option(option).unwrap(), original);
}

#[test]
fn test_named_option_accessors() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);

    socket.set_loopback(true).unwrap();
    assert!(socket.loopback().unwrap());
    socket.set_recv_own_msgs(true).unwrap();
    assert!(socket.recv_own_msgs().unwrap());
    socket.set_recv_own_msgs(false).unwrap();
    assert!(!socket.recv_own_msgs().unwrap());
    socket.set_loopback(false).unwrap();
    assert!(!socket.loopback().unwrap());
}

#[test]
fn test_option_failure() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Bcm);
    let err = socket.set_loopback(true).unwrap_err();
    assert!(matches!(
        err,
        CanSocketError::Option {
            option: SocketOption::Loopback,
            ..
        }
    ));
}

#[test]
fn test_mtu_values() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    let can0 = CanInterface::lookup(&socket, "can0").unwrap();
    socket.bind(&can0).unwrap();

    let constants = *socket.transport().constants();
    let mtu = socket.mtu("can0").unwrap();
    assert!(mtu == constants.can_mtu || mtu == constants.canfd_mtu);
    assert_eq!(mtu, 16);
    assert!(!socket.is_fd_capable("can0").unwrap());

    assert_eq!(socket.mtu("canfd0").unwrap(), constants.canfd_mtu);
    assert!(socket.is_fd_capable("canfd0").unwrap());
}

#[test]
fn test_unexpected_mtu_is_an_error() {
    let mock = mock();
    let socket = open(&mock, SocketMode::Raw);
    match socket.mtu("weird0") {
        Err(CanSocketError::UnexpectedMtu { name, mtu }) => {
            assert_eq!(name, "weird0");
            assert_eq!(mtu, 1500);
        }
        other => panic!("Expected UnexpectedMtu, got {:?}", other),
    }
    assert!(matches!(
        socket.mtu("missing0"),
        Err(CanSocketError::Mtu { .. })
    ));
}

#[test]
fn test_fd_frame_requires_fd_mode() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    let canfd0 = CanInterface::lookup(&socket, "canfd0").unwrap();
    socket.bind(&canfd0).unwrap();
    assert!(socket.is_fd_capable("canfd0").unwrap());

    let frame = CanFrame::new_fd(canfd0, CanId::new(0x100), vec![0xAB; 48]).unwrap();
    let sends_before = mock.calls(MockOp::Send);
    assert!(matches!(
        socket.send(&frame),
        Err(CanSocketError::FdNotEnabled)
    ));
    assert_eq!(mock.calls(MockOp::Send), sends_before);

    socket.set_fd_frames(true).unwrap();
    socket.send(&frame).unwrap();
    let sent = &mock.sent_frames()[0].frame;
    assert_eq!(sent.kind, FrameKind::Fd);
    assert_eq!(sent.data.len(), 48);

    socket.set_fd_frames(false).unwrap();
    assert!(socket.send(&frame).is_err());
}

#[test]
fn test_second_close_fails() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    socket.close().unwrap();
    assert!(socket.is_closed());
    assert!(matches!(socket.close(), Err(CanSocketError::AlreadyClosed)));
    assert_eq!(mock.calls(MockOp::Close), 1);
}

#[test]
fn test_operations_after_close() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    socket.close().unwrap();
    let calls = mock.total_calls();

    let frame =
        CanFrame::new(CanInterface::from_index(3), CanId::new(0x1), Vec::<u8>::new()).unwrap();
    assert!(matches!(
        socket.bind(&ALL_INTERFACES),
        Err(CanSocketError::AlreadyClosed)
    ));
    assert!(matches!(
        socket.send(&frame),
        Err(CanSocketError::AlreadyClosed)
    ));
    assert!(matches!(socket.recv(), Err(CanSocketError::AlreadyClosed)));
    assert!(matches!(
        socket.mtu("can0"),
        Err(CanSocketError::AlreadyClosed)
    ));
    assert!(matches!(
        socket.loopback(),
        Err(CanSocketError::AlreadyClosed)
    ));
    assert_eq!(socket.interface_name(3), None);
    assert_eq!(mock.total_calls(), calls);
}

#[test]
fn test_close_failure_still_closes() {
    let mock = mock();
    let mut socket = open(&mock, SocketMode::Raw);
    mock.fail_next(
        MockOp::Close,
        TransportError::Io(io::Error::new(io::ErrorKind::Interrupted, "interrupted")),
    );
    assert!(matches!(socket.close(), Err(CanSocketError::Close(_))));
    assert!(socket.is_closed());
    assert!(matches!(socket.close(), Err(CanSocketError::AlreadyClosed)));
}

#[test]
fn test_drop_closes_open_socket() {
    let mock = mock();
    let handle = {
        let socket = open(&mock, SocketMode::Raw);
        socket.handle()
    };
    assert!(!mock.is_open(handle));
    assert_eq!(mock.calls(MockOp::Close), 1);

    let mut socket = open(&mock, SocketMode::Raw);
    socket.close().unwrap();
    drop(socket);
    assert_eq!(mock.calls(MockOp::Close), 2);
}
