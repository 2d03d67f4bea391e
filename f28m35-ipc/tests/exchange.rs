mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use common::{serve_until, PATIENCE};
use f28m35_ipc::exchange::{
    await_address, pack_parameters, publish_address, unpack_parameters, ExchangeConfig,
    ParameterExchange, EXCHANGED_PARAMETERS,
};
use f28m35_ipc::flags::{IpcInterrupt, IPC_FLAG17, IPC_FLAG32};
use f28m35_ipc::memory::{AddressSpace, NoFunctions, WriteProtect};
use f28m35_ipc::ownership::{LocalArbiter, Owner, RemoteArbiter};
use f28m35_ipc::responder::{ErrorIndicator, Responder};
use f28m35_ipc::shared::{
    SxMask, CTRL_MTOC_MSGRAM_START, MASTER_MTOC_MSGRAM_START, MASTER_SX_START,
};
use f28m35_ipc::sim::{Board, Corrupting, Link, CTRL_RAM_START, MASTER_RAM_START};
use f28m35_ipc::{Blocking, Error};

#[test]
fn echo_detects_one_corrupted_round() {
    static BOARD: Board = Board::new();
    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let mut link: Link = Link::new();
    let (mut ctrl_ctl, mut master_ctl) = link.controllers(&ctrl, &master, IpcInterrupt::Int1);

    let peer_buffer = MASTER_RAM_START + 0x1000;
    let faulty = Corrupting::new(&master, peer_buffer, 0x0400);
    let done = AtomicBool::new(false);
    let errors = ErrorIndicator::new();

    let params: [f32; EXCHANGED_PARAMETERS] = core::array::from_fn(|i| i as f32 * 0.5 - 3.0);
    let mut words = [0u16; 2 * EXCHANGED_PARAMETERS];
    assert_eq!(pack_parameters(&params, &mut words), words.len());

    thread::scope(|s| {
        s.spawn(|| {
            publish_address(&master, &master, MASTER_MTOC_MSGRAM_START, peer_buffer, IPC_FLAG32);
            let responder = Responder::new(&faulty, &master, &NoFunctions, &errors);
            serve_until(&responder, &mut master_ctl, &done)
        });

        let learned = await_address(&ctrl, &ctrl, CTRL_MTOC_MSGRAM_START, IPC_FLAG32, PATIENCE);
        let mut exchange = ParameterExchange::new(ExchangeConfig {
            blocking: PATIENCE,
            ..ExchangeConfig::default()
        });
        exchange.set_peer_buffer(learned.unwrap());
        let arbiter = RemoteArbiter::new(&ctrl);

        let clean = exchange.run(&mut ctrl_ctl, &arbiter, &ctrl, &words).unwrap();
        assert!(clean.is_clean());
        assert_eq!(clean.words, words.len() as u16);
        assert_eq!(exchange.stats().errors, 0);

        faulty.arm();
        let hit = exchange.run(&mut ctrl_ctl, &arbiter, &ctrl, &words).unwrap();
        assert_eq!(hit.mismatched, 1);
        assert_eq!(exchange.stats().errors, 1);
        assert!(exchange.stats().mismatch);

        let again = exchange.run(&mut ctrl_ctl, &arbiter, &ctrl, &words).unwrap();
        assert!(again.is_clean());
        let stats = exchange.stats();
        assert_eq!((stats.rounds, stats.errors, stats.mismatch), (3, 1, false));
        done.store(true, Ordering::SeqCst);
    });

    assert_eq!(faulty.fired(), 1);
    assert!(!errors.is_raised());
    assert_eq!(BOARD.dropped_writes(), 0);

    let mut back = [0.0f32; EXCHANGED_PARAMETERS];
    let echoed: Vec<u16> = (0..words.len() as u32)
        .map(|i| master.read16(peer_buffer + 2 * i))
        .collect();
    unpack_parameters(&echoed, &mut back);
    assert_eq!(back, params);
}

#[test]
fn master_runs_the_exchange_with_local_arbiter() {
    static BOARD: Board = Board::new();
    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let mut link: Link = Link::new();
    let (mut ctrl_ctl, mut master_ctl) = link.controllers(&ctrl, &master, IpcInterrupt::Int1);

    let peer_buffer = CTRL_RAM_START + 0x800;
    let done = AtomicBool::new(false);
    let errors = ErrorIndicator::new();

    let params: [f32; EXCHANGED_PARAMETERS] = core::array::from_fn(|i| 100.0 - i as f32 * 1.25);
    let mut words = [0u16; 2 * EXCHANGED_PARAMETERS];
    pack_parameters(&params, &mut words);

    thread::scope(|s| {
        s.spawn(|| {
            let responder = Responder::new(&ctrl, &ctrl, &NoFunctions, &errors);
            serve_until(&responder, &mut ctrl_ctl, &done)
        });

        let mut exchange = ParameterExchange::new(ExchangeConfig {
            blocks: SxMask::S0,
            local: Owner::Master,
            transmit: MASTER_SX_START,
            receive: MASTER_SX_START + 0x200,
            peer_buffer,
            response: IPC_FLAG17,
            blocking: PATIENCE,
        });
        let arbiter = LocalArbiter::new(&master, &master);

        for _ in 0..2 {
            let report = exchange.run(&mut master_ctl, &arbiter, &master, &words).unwrap();
            assert_eq!(report.words, 88);
            assert!(report.is_clean());
            // the round ends with the block handed to the control core
            assert_eq!(BOARD.ctrl_owned(), SxMask::S0);
        }
        let stats = exchange.stats();
        assert_eq!((stats.rounds, stats.errors, stats.mismatch), (2, 0, false));
        done.store(true, Ordering::SeqCst);
    });

    assert!(!errors.is_raised());
    assert_eq!(BOARD.dropped_writes(), 0);
    assert!(!master.writes_allowed());
    for (i, word) in (0u32..).zip(&words) {
        assert_eq!(ctrl.read16(peer_buffer + i), *word);
    }
}

#[test]
fn oversize_buffer_is_refused_up_front() {
    static BOARD: Board = Board::new();
    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let mut link: Link = Link::new();
    let (mut ctrl_ctl, _master_ctl) = link.controllers(&ctrl, &master, IpcInterrupt::Int1);

    let mut exchange = ParameterExchange::new(ExchangeConfig {
        peer_buffer: MASTER_RAM_START,
        blocking: Blocking::Disabled,
        ..ExchangeConfig::default()
    });
    let words = vec![0u16; 0x1_0000];
    let arbiter = RemoteArbiter::new(&ctrl);

    assert_eq!(
        exchange.run(&mut ctrl_ctl, &arbiter, &ctrl, &words),
        Err(Error::BlockTooLong(0x1_0000))
    );
    assert_eq!(ctrl_ctl.in_flight(), 0);
    assert_eq!(BOARD.ctrl_owned(), SxMask::empty());
    assert_eq!(exchange.stats().rounds, 0);
}
