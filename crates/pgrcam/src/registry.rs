//! Live sessions and images owned on behalf of the host
//!
//! Both C surfaces (`ffi` and `idl`) go through these functions, so the two
//! conventions share one set of handle tables and one lock order: session
//! before image.

use lazy_static::lazy_static;
use pgrcam_core::{Frame, FrameView, Image, Result, Session, SessionState};
use tracing::debug;

use crate::driver;
use crate::handles::HandleTable;

lazy_static! {
    static ref SESSIONS: HandleTable<Session> = HandleTable::new("session");
    static ref IMAGES: HandleTable<Image> = HandleTable::new("image");
}

/// Create a session with the current driver and register it.
pub fn create_session() -> Result<u64> {
    let driver = driver::current();
    let session = Session::create(driver.as_ref())?;
    Ok(register_session(session))
}

pub fn register_session(session: Session) -> u64 {
    let token = SESSIONS.insert(session);
    debug!(session = token, "registered session");
    token
}

pub fn register_image(image: Image) -> u64 {
    let token = IMAGES.insert(image);
    debug!(image = token, "registered image");
    token
}

/// Unregister and destroy a session. The token is dead even if the SDK
/// reports a failure while releasing.
pub fn destroy_session(token: u64) -> Result<()> {
    SESSIONS.remove(token)?.destroy()
}

pub fn destroy_image(token: u64) -> Result<()> {
    IMAGES.remove(token)?.destroy()
}

/// Run `f` with exclusive access to a session.
pub fn with_session<R>(token: u64, f: impl FnOnce(&mut Session) -> Result<R>) -> Result<R> {
    let entry = SESSIONS.get(token)?;
    let mut session = entry.lock();
    f(&mut session)
}

pub fn session_state(token: u64) -> Result<SessionState> {
    with_session(token, |session| Ok(session.state()))
}

/// Allocate an image through a session and register it.
pub fn create_image(session: u64) -> Result<u64> {
    let image = with_session(session, |s| s.create_image())?;
    Ok(register_image(image))
}

/// Retrieve the next frame into `image` and hand its view to `f`.
pub fn with_frame<R>(
    session: u64,
    image: u64,
    f: impl FnOnce(&FrameView<'_>) -> Result<R>,
) -> Result<R> {
    let image_entry = IMAGES.get(image)?;
    with_session(session, |s| {
        let mut image = image_entry.lock();
        let view = s.retrieve_buffer(&mut image)?;
        f(&view)
    })
}

/// Retrieve the next frame and copy it out.
pub fn retrieve(session: u64, image: u64) -> Result<Frame> {
    with_frame(session, image, |view| Ok(view.to_frame()))
}

pub fn session_count() -> usize {
    SESSIONS.len()
}

pub fn image_count() -> usize {
    IMAGES.len()
}
