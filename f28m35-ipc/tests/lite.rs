use f28m35_ipc::fabric::send_command;
use f28m35_ipc::flags::{IPC_FLAG20, IPC_FLAG4};
use f28m35_ipc::lite::{LiteRequester, LiteResponder};
use f28m35_ipc::memory::{AddressSpace, FunctionRegistry, NoFunctions, Width};
use f28m35_ipc::ownership::Owner;
use f28m35_ipc::shared::SxMask;
use f28m35_ipc::sim::{Board, MASTER_RAM_START};
use f28m35_ipc::{Blocking, Core, Error};

const FLAG: f28m35_ipc::flags::IpcFlags = IPC_FLAG4;
const STATUS: f28m35_ipc::flags::IpcFlags = IPC_FLAG20;

#[test]
fn second_request_leaves_registers_alone() {
    static BOARD: Board = Board::new();
    let ctrl = BOARD.ctrl();
    let requester = LiteRequester::new(&ctrl);

    requester
        .data_write(FLAG, STATUS, MASTER_RAM_START + 0x10, 0xABCD, Width::Bits16)
        .unwrap();
    let before = BOARD.lite_registers(Core::Ctrl);
    assert_eq!(
        requester.set_bits(FLAG, STATUS, MASTER_RAM_START + 0x20, 0xFF, Width::Bits32),
        Err(Error::FlagBusy)
    );
    assert_eq!(BOARD.lite_registers(Core::Ctrl), before);
    assert!(!requester.is_done(FLAG));
}

#[test]
fn request_served_and_result_read() {
    static BOARD: Board = Board::new();
    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let requester = LiteRequester::new(&ctrl);
    let responder = LiteResponder::new(&master, &master, &master, &NoFunctions);

    master.write32(MASTER_RAM_START + 0x10, 0x00FF_0F0F);
    requester
        .clear_bits(FLAG, STATUS, MASTER_RAM_START + 0x10, 0x0000_000F, Width::Bits32)
        .unwrap();
    assert_eq!(responder.serve(FLAG, STATUS, Blocking::Disabled), Ok(0x00FF_0F00));
    requester.wait_done(FLAG, Blocking::Disabled).unwrap();
    assert_eq!(requester.result(STATUS, Width::Bits32), Ok(0x00FF_0F00));

    requester
        .data_read(FLAG, STATUS, MASTER_RAM_START + 0x12, Width::Bits16)
        .unwrap();
    responder.serve(FLAG, STATUS, Blocking::Disabled).unwrap();
    assert_eq!(requester.result(STATUS, Width::Bits16), Ok(0x00FF));
}

#[test]
fn nothing_to_serve() {
    static BOARD: Board = Board::new();
    let master = BOARD.master();
    let responder = LiteResponder::new(&master, &master, &master, &NoFunctions);
    assert_eq!(
        responder.serve(FLAG, STATUS, Blocking::Disabled),
        Err(Error::FlagBusy)
    );
}

#[test]
fn unknown_command_is_rejected() {
    static BOARD: Board = Board::new();
    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let requester = LiteRequester::new(&ctrl);
    let responder = LiteResponder::new(&master, &master, &master, &NoFunctions);

    send_command(&ctrl, FLAG | STATUS, 0x77, MASTER_RAM_START, 0);
    assert_eq!(
        responder.serve(FLAG, STATUS, Blocking::Disabled),
        Err(Error::UnknownCommand(0x77))
    );
    assert!(requester.is_done(FLAG));
    assert_eq!(requester.result(STATUS, Width::Bits32), Err(Error::Rejected));
}

#[test]
fn rejected_pair_is_freed_by_withdraw() {
    static BOARD: Board = Board::new();
    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let requester = LiteRequester::new(&ctrl);
    let responder = LiteResponder::new(&master, &master, &master, &NoFunctions);

    send_command(&ctrl, FLAG | STATUS, 0x77, MASTER_RAM_START, 0);
    assert_eq!(requester.withdraw(FLAG, STATUS), Err(Error::FlagBusy));
    assert!(responder.serve(FLAG, STATUS, Blocking::Disabled).is_err());
    assert_eq!(
        requester.data_write(FLAG, STATUS, MASTER_RAM_START, 1, Width::Bits16),
        Err(Error::FlagBusy)
    );

    requester.withdraw(FLAG, STATUS).unwrap();
    requester
        .data_write(FLAG, STATUS, MASTER_RAM_START, 0x1234, Width::Bits16)
        .unwrap();
    responder.serve(FLAG, STATUS, Blocking::Disabled).unwrap();
    assert!(requester.result(STATUS, Width::Bits16).is_ok());
    assert_eq!(master.read16(MASTER_RAM_START), 0x1234);
}

#[test]
fn function_call_returns_value() {
    static BOARD: Board = Board::new();

    fn triple(x: u32) -> u32 {
        3 * x
    }

    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let table = [(0x0000_1800, triple as fn(u32) -> u32)];
    let functions = FunctionRegistry::new(&table);
    let requester = LiteRequester::new(&master);
    let responder = LiteResponder::new(&ctrl, &ctrl, &ctrl, &functions);

    requester.function_call(FLAG, STATUS, 0x0000_1800, 14).unwrap();
    assert_eq!(responder.serve(FLAG, STATUS, Blocking::Disabled), Ok(42));
    assert_eq!(requester.result(STATUS, Width::Bits32), Ok(42));
}

#[test]
fn memory_access_through_lite_registers() {
    static BOARD: Board = Board::new();
    let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
    let requester = LiteRequester::new(&ctrl);
    let responder = LiteResponder::new(&master, &master, &master, &NoFunctions);

    requester
        .request_memory_access(FLAG, STATUS, &ctrl, SxMask::S6, Owner::Ctrl)
        .unwrap();
    assert_eq!(responder.serve(FLAG, STATUS, Blocking::Disabled), Ok(SxMask::S6.bits()));
    assert_eq!(BOARD.ctrl_owned(), SxMask::S6);

    // already owned: nothing is sent
    requester
        .request_memory_access(FLAG, STATUS, &ctrl, SxMask::S6, Owner::Ctrl)
        .unwrap();
    assert!(requester.is_done(FLAG));
}
