//! C ABI exports over [`Session`].
//!
//! Every function returns a [`ResultCode`]; on failure the detail is in
//! the thread's last-error slot. Out-parameters are written only on
//! success.

use std::ffi::{c_char, CStr};
use std::path::Path;

use columba_core::{Config, Database};

use crate::error::{guard, FfiError, FfiResult, ResultCode};
use crate::marshal::{from_bool, to_bool, StringAccessor};
use crate::session::Session;

/// Opaque session type for C.
#[repr(C)]
pub struct ColumbaSession {
    _private: [u8; 0],
}

fn run(f: impl FnOnce() -> FfiResult<()>) -> ResultCode {
    guard(f).err().unwrap_or(ResultCode::Ok)
}

fn required<T>(value: Option<T>, name: &'static str) -> FfiResult<T> {
    value.ok_or(FfiError::NullPointer(name))
}

unsafe fn session_ref<'a>(session: *const ColumbaSession) -> Option<&'a Session> {
    session.cast::<Session>().as_ref()
}

unsafe fn bytes<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if data.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(data, len))
    }
}

fn name_arg<'a>(session: &Session, name: Option<&'a [u8]>) -> FfiResult<&'a str> {
    let name = StringAccessor::new(Some(required(name, "name")?));
    required(name.to_str(session.database().config().max_string_size)?, "name")
}

fn install(session: Session, out: Option<&mut *mut ColumbaSession>) -> FfiResult<()> {
    let out = required(out, "out_session")?;
    *out = Box::into_raw(Box::new(session)).cast::<ColumbaSession>();
    Ok(())
}

/// Opens a session over a fresh in-memory database.
///
/// # Safety
///
/// `out_session` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn columba_session_open_in_memory(
    out_session: *mut *mut ColumbaSession,
) -> ResultCode {
    let out = out_session.as_mut();
    run(|| install(Session::open_in_memory(Config::default())?, out))
}

/// Opens a session over the database directory at `path`.
///
/// # Safety
///
/// `path` must be a valid NUL-terminated string and `out_session` a valid
/// pointer.
#[no_mangle]
pub unsafe extern "C" fn columba_session_open(
    path: *const c_char,
    out_session: *mut *mut ColumbaSession,
) -> ResultCode {
    let path = if path.is_null() { None } else { Some(CStr::from_ptr(path)) };
    let out = out_session.as_mut();
    run(|| {
        let path = required(path, "path")?.to_str()?;
        install(Session::new(Database::open(Path::new(path))?), out)
    })
}

/// Frees a session; open transactions are rolled back.
///
/// # Safety
///
/// `session` must come from an open call and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn columba_session_free(session: *mut ColumbaSession) {
    if !session.is_null() {
        drop(Box::from_raw(session.cast::<Session>()));
    }
}

/// Starts a read transaction.
///
/// # Safety
///
/// `session` and `out_txn` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn columba_begin_read(
    session: *const ColumbaSession,
    out_txn: *mut i64,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_txn.as_mut());
    run(|| {
        let txn = required(session, "session")?.begin_read()?;
        *required(out, "out_txn")? = txn;
        Ok(())
    })
}

/// Starts the write transaction, blocking while another writer is active.
///
/// # Safety
///
/// `session` and `out_txn` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn columba_begin_write(
    session: *const ColumbaSession,
    out_txn: *mut i64,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_txn.as_mut());
    run(|| {
        let out = required(out, "out_txn")?;
        *out = required(session, "session")?.begin_write()?;
        Ok(())
    })
}

/// Commits a write transaction.
///
/// # Safety
///
/// `session` must be valid; `out_version` may be null.
#[no_mangle]
pub unsafe extern "C" fn columba_commit(
    session: *const ColumbaSession,
    txn: i64,
    out_version: *mut u64,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_version.as_mut());
    run(|| {
        let version = required(session, "session")?.commit(txn)?;
        if let Some(out) = out {
            *out = version;
        }
        Ok(())
    })
}

/// Rolls back a write transaction.
///
/// # Safety
///
/// `session` must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_rollback(session: *const ColumbaSession, txn: i64) -> ResultCode {
    let session = session_ref(session);
    run(|| required(session, "session")?.rollback(txn))
}

/// Ends a transaction of either kind.
///
/// # Safety
///
/// `session` must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_close_transaction(
    session: *const ColumbaSession,
    txn: i64,
) -> ResultCode {
    let session = session_ref(session);
    run(|| required(session, "session")?.close(txn))
}

/// Advances a read transaction; `out_changed` receives 1 if it moved.
///
/// # Safety
///
/// `session` and `out_changed` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn columba_advance(
    session: *const ColumbaSession,
    txn: i64,
    out_changed: *mut u8,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_changed.as_mut());
    run(|| {
        let changed = required(session, "session")?.advance(txn)?;
        *required(out, "out_changed")? = from_bool(changed);
        Ok(())
    })
}

/// Looks up a table by name; `out_table` receives -1 if absent.
///
/// # Safety
///
/// `name` must be valid for `name_len` bytes; pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_table(
    session: *const ColumbaSession,
    txn: i64,
    name: *const u8,
    name_len: usize,
    out_table: *mut i64,
) -> ResultCode {
    let (session, name, out) = (session_ref(session), bytes(name, name_len), out_table.as_mut());
    run(|| {
        let session = required(session, "session")?;
        let table = session.table(txn, name_arg(session, name)?)?;
        *required(out, "out_table")? = table;
        Ok(())
    })
}

/// Adds a table in a write transaction.
///
/// # Safety
///
/// `name` must be valid for `name_len` bytes; pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_add_table(
    session: *const ColumbaSession,
    txn: i64,
    name: *const u8,
    name_len: usize,
    out_table: *mut i64,
) -> ResultCode {
    let (session, name, out) = (session_ref(session), bytes(name, name_len), out_table.as_mut());
    run(|| {
        let session = required(session, "session")?;
        let table = session.add_table(txn, name_arg(session, name)?)?;
        *required(out, "out_table")? = table;
        Ok(())
    })
}

/// Adds a scalar column.
///
/// # Safety
///
/// `name` must be valid for `name_len` bytes; pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_add_column(
    session: *const ColumbaSession,
    table: i64,
    name: *const u8,
    name_len: usize,
    type_code: i32,
    nullable: u8,
    out_col: *mut i64,
) -> ResultCode {
    let (session, name, out) = (session_ref(session), bytes(name, name_len), out_col.as_mut());
    run(|| {
        let session = required(session, "session")?;
        let col =
            session.add_column(table, name_arg(session, name)?, type_code, to_bool(nullable))?;
        *required(out, "out_col")? = col;
        Ok(())
    })
}

/// Creates an object.
///
/// # Safety
///
/// `session` and `out_obj` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn columba_create_object(
    session: *const ColumbaSession,
    table: i64,
    out_obj: *mut i64,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_obj.as_mut());
    run(|| {
        let obj = required(session, "session")?.create_object(table)?;
        *required(out, "out_obj")? = obj;
        Ok(())
    })
}

/// Returns 1 if the object handle is live and its row exists.
///
/// # Safety
///
/// `session` must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn columba_object_is_valid(session: *const ColumbaSession, obj: i64) -> u8 {
    from_bool(session_ref(session).is_some_and(|s| s.object_is_valid(obj)))
}

/// Reads an int cell.
///
/// # Safety
///
/// `session` and `out_value` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn columba_get_int(
    session: *const ColumbaSession,
    obj: i64,
    col: i64,
    out_value: *mut i64,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_value.as_mut());
    run(|| {
        let value = required(session, "session")?.get_int(obj, col)?;
        *required(out, "out_value")? = value;
        Ok(())
    })
}

/// Writes an int cell.
///
/// # Safety
///
/// `session` must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_set_int(
    session: *const ColumbaSession,
    obj: i64,
    col: i64,
    value: i64,
) -> ResultCode {
    let session = session_ref(session);
    run(|| required(session, "session")?.set_int(obj, col, value))
}

/// Writes a string cell; a null `data` pointer writes null.
///
/// # Safety
///
/// `data` must be null or valid for `len` bytes; `session` must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_set_string(
    session: *const ColumbaSession,
    obj: i64,
    col: i64,
    data: *const u8,
    len: usize,
) -> ResultCode {
    let (session, value) = (session_ref(session), StringAccessor::new(bytes(data, len)));
    run(|| required(session, "session")?.set_string(obj, col, value))
}

/// Reads a timestamp cell as milliseconds.
///
/// # Safety
///
/// `session` and `out_ms` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn columba_get_timestamp(
    session: *const ColumbaSession,
    obj: i64,
    col: i64,
    out_ms: *mut i64,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_ms.as_mut());
    run(|| {
        let value = required(session, "session")?.get_timestamp(obj, col)?;
        *required(out, "out_ms")? = value;
        Ok(())
    })
}

/// Writes a timestamp cell from milliseconds.
///
/// # Safety
///
/// `session` must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_set_timestamp(
    session: *const ColumbaSession,
    obj: i64,
    col: i64,
    milliseconds: i64,
) -> ResultCode {
    let session = session_ref(session);
    run(|| required(session, "session")?.set_timestamp(obj, col, milliseconds))
}

/// Writes null into a nullable cell.
///
/// # Safety
///
/// `session` must be valid.
#[no_mangle]
pub unsafe extern "C" fn columba_set_null(
    session: *const ColumbaSession,
    obj: i64,
    col: i64,
) -> ResultCode {
    let session = session_ref(session);
    run(|| required(session, "session")?.set_null(obj, col))
}

/// Finds the first object whose int column equals `value`.
///
/// # Safety
///
/// `session` and `out_key` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn columba_find_first_int(
    session: *const ColumbaSession,
    table: i64,
    col: i64,
    value: i64,
    out_key: *mut i64,
) -> ResultCode {
    let (session, out) = (session_ref(session), out_key.as_mut());
    run(|| {
        let key = required(session, "session")?.find_first_int(table, col, value)?;
        *required(out, "out_key")? = key;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{columba_last_error_message, last_error_code, last_error_message};
    use columba_core::{ColumnType, NOT_FOUND};
    use std::ptr;

    #[test]
    fn lifecycle_through_c_abi() {
        unsafe {
            let mut session = ptr::null_mut();
            assert_eq!(columba_session_open_in_memory(&mut session), ResultCode::Ok);

            let mut txn = 0;
            assert_eq!(columba_begin_write(session, &mut txn), ResultCode::Ok);
            let name = b"class_Person";
            let mut table = 0;
            assert_eq!(
                columba_add_table(session, txn, name.as_ptr(), name.len(), &mut table),
                ResultCode::Ok
            );
            let mut col = 0;
            let col_name = b"age";
            assert_eq!(
                columba_add_column(
                    session,
                    table,
                    col_name.as_ptr(),
                    col_name.len(),
                    ColumnType::Int.code(),
                    0,
                    &mut col
                ),
                ResultCode::Ok
            );
            let mut obj = 0;
            assert_eq!(columba_create_object(session, table, &mut obj), ResultCode::Ok);
            assert_eq!(columba_set_int(session, obj, col, 7), ResultCode::Ok);

            let mut key = 0;
            assert_eq!(columba_find_first_int(session, table, col, 7, &mut key), ResultCode::Ok);
            assert_eq!(key, 0);
            assert_eq!(columba_find_first_int(session, table, col, 8, &mut key), ResultCode::Ok);
            assert_eq!(key, NOT_FOUND);

            let mut version = 0;
            assert_eq!(columba_commit(session, txn, &mut version), ResultCode::Ok);
            assert_eq!(version, 1);
            assert_eq!(columba_object_is_valid(session, obj), 0);

            columba_session_free(session);
        }
    }

    #[test]
    fn failures_fill_last_error() {
        unsafe {
            let mut txn = 0;
            let code = columba_begin_read(ptr::null(), &mut txn);
            assert_eq!(code, ResultCode::IllegalArgument);
            assert_eq!(last_error_code(), ResultCode::IllegalArgument);
            assert!(!columba_last_error_message().is_null());

            let mut session = ptr::null_mut();
            columba_session_open_in_memory(&mut session);
            assert_eq!(columba_set_int(session, 99, 1, 1), ResultCode::IllegalState);
            assert_eq!(last_error_message().as_deref(), Some("object handle 99 is not valid"));

            // a successful call clears the slot
            assert_eq!(columba_begin_read(session, &mut txn), ResultCode::Ok);
            assert!(columba_last_error_message().is_null());
            columba_session_free(session);
        }
    }

    #[test]
    fn null_string_writes_null() {
        unsafe {
            let mut session = ptr::null_mut();
            columba_session_open_in_memory(&mut session);
            let s = session_ref(session).unwrap();
            let w = s.begin_write().unwrap();
            let t = s.add_table(w, "t").unwrap();
            let col = s.add_column(t, "s", ColumnType::String.code(), true).unwrap();
            let o = s.create_object(t).unwrap();
            let text = b"hi";
            assert_eq!(columba_set_string(session, o, col, text.as_ptr(), 2), ResultCode::Ok);
            assert_eq!(s.get_string(o, col).unwrap().as_deref(), Some("hi"));
            assert_eq!(columba_set_string(session, o, col, ptr::null(), 0), ResultCode::Ok);
            assert!(s.is_null(o, col).unwrap());
            columba_session_free(session);
        }
    }
}
