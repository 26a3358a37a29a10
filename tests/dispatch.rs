// Author: Lukas Bower
// Purpose: Exercise session dispatch end to end against the rendezvous namespace.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::thread;

use chan_door::proto::{
    ErrorCode, OpenMode, Qid, Request, RequestBody, ResponseBody, IOUNIT,
};
use chan_door::{GatewayHandler, Handler, QidAllocator, Session};

fn new_root() -> (Arc<dyn Handler>, Arc<QidAllocator>) {
    let _ = env_logger::builder().is_test(true).try_init();
    (Arc::new(GatewayHandler::new()), Arc::new(QidAllocator::new()))
}

fn transact(session: &mut Session, body: RequestBody) -> ResponseBody {
    let response = session.handle(Request { tag: 42, body });
    assert_eq!(response.tag, 42);
    response.body
}

fn attach(session: &mut Session, fid: u32) -> Qid {
    match transact(
        session,
        RequestBody::Attach {
            fid,
            uname: "queen".to_owned(),
            aname: String::new(),
        },
    ) {
        ResponseBody::Attach { qid } => qid,
        other => panic!("unexpected attach response: {other:?}"),
    }
}

fn walk(session: &mut Session, fid: u32, newfid: u32, wnames: &[&str]) -> Vec<Qid> {
    match transact(
        session,
        RequestBody::Walk {
            fid,
            newfid,
            wnames: wnames.iter().map(|w| (*w).to_owned()).collect(),
        },
    ) {
        ResponseBody::Walk { qids } => qids,
        other => panic!("unexpected walk response: {other:?}"),
    }
}

fn create(session: &mut Session, fid: u32, name: &str, mode: OpenMode) -> Qid {
    match transact(
        session,
        RequestBody::Create {
            fid,
            name: name.to_owned(),
            directory: false,
            mode,
        },
    ) {
        ResponseBody::Create { qid, iounit } => {
            assert_eq!(iounit, IOUNIT);
            qid
        }
        other => panic!("unexpected create response: {other:?}"),
    }
}

fn open(session: &mut Session, fid: u32, mode: OpenMode) -> Qid {
    match transact(session, RequestBody::Open { fid, mode }) {
        ResponseBody::Open { qid, iounit } => {
            assert_eq!(iounit, IOUNIT);
            qid
        }
        other => panic!("unexpected open response: {other:?}"),
    }
}

fn error_code(body: ResponseBody) -> ErrorCode {
    match body {
        ResponseBody::Error { code, .. } => code,
        other => panic!("expected error response, got {other:?}"),
    }
}

#[test]
fn attach_binds_fid_and_returns_directory_qid() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    let qid = attach(&mut session, 0);
    assert!(qid.ty().is_directory());
    assert_eq!(qid.version(), 0);
}

#[test]
fn two_sessions_bridge_a_message_through_one_channel() {
    let (root, qids) = new_root();
    let mut producer = Session::new(root.clone(), qids.clone());
    let mut consumer = Session::new(root, qids);

    attach(&mut producer, 0);
    walk(&mut producer, 0, 1, &[]);
    create(&mut producer, 1, "bridge", OpenMode::write_only());

    attach(&mut consumer, 0);
    walk(&mut consumer, 0, 1, &["bridge"]);
    open(&mut consumer, 1, OpenMode::read_only());

    let handle = thread::spawn(move || {
        // Blocks inside the session until the consumer reads.
        transact(
            &mut producer,
            RequestBody::Write {
                fid: 1,
                offset: 0,
                data: b"ping".to_vec(),
            },
        )
    });

    let data = match transact(
        &mut consumer,
        RequestBody::Read {
            fid: 1,
            offset: 0,
            count: 64,
        },
    ) {
        ResponseBody::Read { data } => data,
        other => panic!("unexpected read response: {other:?}"),
    };
    assert_eq!(data, b"ping");
    match handle.join().expect("join") {
        ResponseBody::Write { count } => assert_eq!(count, 4),
        other => panic!("unexpected write response: {other:?}"),
    }
}

#[test]
fn qid_paths_strictly_increase_across_sessions() {
    let (root, qids) = new_root();
    let mut first = Session::new(root.clone(), qids.clone());
    let mut second = Session::new(root, qids);

    let mut paths = Vec::new();
    paths.push(attach(&mut first, 0).path());
    paths.push(attach(&mut second, 0).path());
    paths.push(walk(&mut first, 0, 1, &[])[0].path());
    paths.push(create(&mut first, 1, "a", OpenMode::write_only()).path());
    paths.push(walk(&mut second, 0, 1, &["a"])[0].path());
    paths.push(open(&mut second, 1, OpenMode::read_only()).path());
    // Revisiting the same node still issues a fresh qid.
    paths.push(walk(&mut second, 0, 2, &["a"])[0].path());

    for pair in paths.windows(2) {
        assert!(pair[0] < pair[1], "paths not strictly increasing: {paths:?}");
    }
}

#[test]
fn open_qid_type_copies_the_requested_mode_bits() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    walk(&mut session, 0, 1, &[]);
    create(&mut session, 1, "a", OpenMode::write_only());

    walk(&mut session, 0, 2, &["a"]);
    let mode = OpenMode::read_write();
    let qid = open(&mut session, 2, mode);
    assert_eq!(u8::from(qid.ty()), mode.raw());
}

#[test]
fn failed_walk_leaves_newfid_unbound() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);

    let body = transact(
        &mut session,
        RequestBody::Walk {
            fid: 0,
            newfid: 5,
            wnames: vec!["missing".to_owned()],
        },
    );
    assert_eq!(error_code(body), ErrorCode::NoSuchEntry);

    let body = transact(
        &mut session,
        RequestBody::Open {
            fid: 5,
            mode: OpenMode::read_only(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::NoSuchFid);
}

#[test]
fn walk_from_unknown_fid_fails() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    let body = transact(
        &mut session,
        RequestBody::Walk {
            fid: 9,
            newfid: 10,
            wnames: Vec::new(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::NoSuchFid);
}

#[test]
fn directory_read_serializes_a_sorted_listing() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    for (fid, name) in [(1, "b"), (2, "a")] {
        walk(&mut session, 0, fid, &[]);
        create(&mut session, fid, name, OpenMode::write_only());
        transact(&mut session, RequestBody::Clunk { fid });
    }

    walk(&mut session, 0, 3, &[]);
    open(&mut session, 3, OpenMode::read_only());
    let read = |session: &mut Session, offset: u64, count: u32| match transact(
        session,
        RequestBody::Read {
            fid: 3,
            offset,
            count,
        },
    ) {
        ResponseBody::Read { data } => data,
        other => panic!("unexpected read response: {other:?}"),
    };
    assert_eq!(read(&mut session, 0, 64), b"a\nb\n");
    assert_eq!(read(&mut session, 2, 2), b"b\n");
    assert_eq!(read(&mut session, 64, 4), b"");
}

#[test]
fn directory_open_with_write_mode_fails() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    let body = transact(
        &mut session,
        RequestBody::Open {
            fid: 0,
            mode: OpenMode::read_write(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::IsADirectory);
}

#[test]
fn duplicate_create_reports_already_exists() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    walk(&mut session, 0, 1, &[]);
    create(&mut session, 1, "a", OpenMode::write_only());

    walk(&mut session, 0, 2, &[]);
    let body = transact(
        &mut session,
        RequestBody::Create {
            fid: 2,
            name: "a".to_owned(),
            directory: false,
            mode: OpenMode::write_only(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::AlreadyExists);
}

#[test]
fn directory_create_request_is_denied() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    let body = transact(
        &mut session,
        RequestBody::Create {
            fid: 0,
            name: "subdir".to_owned(),
            directory: true,
            mode: OpenMode::read_only(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::PermissionDenied);
}

#[test]
fn io_requires_an_opened_fid_with_matching_access() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    walk(&mut session, 0, 1, &[]);
    create(&mut session, 1, "a", OpenMode::write_only());

    // Walked but not opened.
    walk(&mut session, 0, 2, &["a"]);
    let body = transact(
        &mut session,
        RequestBody::Read {
            fid: 2,
            offset: 0,
            count: 8,
        },
    );
    assert_eq!(error_code(body), ErrorCode::NotOpen);

    // Opened write-only: reads are refused outright, without blocking.
    let body = transact(
        &mut session,
        RequestBody::Write {
            fid: 2,
            offset: 0,
            data: b"x".to_vec(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::NotOpen);

    open(&mut session, 2, OpenMode::read_only());
    let body = transact(
        &mut session,
        RequestBody::Write {
            fid: 2,
            offset: 0,
            data: b"x".to_vec(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::PermissionDenied);

    walk(&mut session, 0, 3, &["a"]);
    open(&mut session, 3, OpenMode::write_only());
    let body = transact(
        &mut session,
        RequestBody::Read {
            fid: 3,
            offset: 0,
            count: 8,
        },
    );
    assert_eq!(error_code(body), ErrorCode::PermissionDenied);
}

#[test]
fn open_items_answer_not_implemented() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    for body in [
        RequestBody::Remove { fid: 0 },
        RequestBody::Stat { fid: 0 },
        RequestBody::Wstat {
            fid: 0,
            stat: Vec::new(),
        },
    ] {
        let response = transact(&mut session, body);
        assert_eq!(error_code(response), ErrorCode::NotImplemented);
    }
}

#[test]
fn flush_is_a_no_op_success() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    let body = transact(&mut session, RequestBody::Flush { oldtag: 7 });
    assert_eq!(body, ResponseBody::Flush);
}

#[test]
fn clunk_always_succeeds_and_releases_the_fid() {
    let (root, qids) = new_root();
    let mut session = Session::new(root, qids);
    attach(&mut session, 0);
    assert_eq!(
        transact(&mut session, RequestBody::Clunk { fid: 0 }),
        ResponseBody::Clunk
    );
    // The fid is gone afterwards.
    let body = transact(
        &mut session,
        RequestBody::Walk {
            fid: 0,
            newfid: 1,
            wnames: Vec::new(),
        },
    );
    assert_eq!(error_code(body), ErrorCode::NoSuchFid);
    // Clunking an unknown fid still answers success.
    assert_eq!(
        transact(&mut session, RequestBody::Clunk { fid: 99 }),
        ResponseBody::Clunk
    );
}
