use notify_rust::{Notification, NotificationHandle, Timeout};

const APP_NAME: &str = "Clue";
const PREVIEW_MAX_EDGE: u32 = 256;

pub fn send(body: impl Into<String>) {
    let body = body.into();
    if let Err(err) = Notification::new()
        .appname(APP_NAME)
        .summary(APP_NAME)
        .body(&body)
        .show()
    {
        tracing::warn!("system notification failed: {err}");
    }
}

/// A desktop notification that stays up until it is replaced or closed.
#[derive(Default)]
pub struct TransientNotice {
    handle: Option<NotificationHandle>,
}

impl TransientNotice {
    /// `preview` holds encoded image bytes; they are shown as a thumbnail when they
    /// decode.
    pub fn show(&mut self, message: &str, preview: Option<&[u8]>) {
        self.close();
        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .summary(APP_NAME)
            .body(message)
            .timeout(Timeout::Never);
        if let Some(image) = preview.and_then(notification_image) {
            notification.image_data(image);
        }
        match notification.show() {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => tracing::warn!("transient notification failed: {err}"),
        }
    }

    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }

    pub fn is_showing(&self) -> bool {
        self.handle.is_some()
    }
}

fn notification_image(bytes: &[u8]) -> Option<notify_rust::Image> {
    let thumbnail = preview_thumbnail(bytes, PREVIEW_MAX_EDGE)?;
    let (width, height) = thumbnail.dimensions();
    let width = i32::try_from(width).ok()?;
    let height = i32::try_from(height).ok()?;
    notify_rust::Image::from_rgba(width, height, thumbnail.into_raw())
        .map_err(|err| tracing::debug!(%err, "preview rejected by notification image"))
        .ok()
}

/// Decodes `bytes` and scales the result to fit within `max_edge`, keeping the
/// aspect ratio. Smaller images are left as they are.
pub fn preview_thumbnail(bytes: &[u8], max_edge: u32) -> Option<image::RgbaImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| tracing::debug!(%err, "capture preview could not be decoded"))
        .ok()?;
    if decoded.width() <= max_edge && decoded.height() <= max_edge {
        return Some(decoded.to_rgba8());
    }
    Some(decoded.thumbnail(max_edge, max_edge).to_rgba8())
}
