//! hls.js / native HLS engine over an `HTMLVideoElement`
//!
//! Each engine owns one `<video>` tile inside the dashboard container. The
//! element is created on first attach and removed from the DOM when the
//! engine is dropped.

use multiview_core::engine::{select_support, PlaybackEngine, PositionListener};
use multiview_core::{EngineSupport, EngineTuning, Error, Result, StreamId, StreamSource, HLS_MIME_TYPE};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Element, HtmlVideoElement};

#[wasm_bindgen]
extern "C" {
    /// The global `Hls` constructor from hls.js
    type Hls;

    #[wasm_bindgen(static_method_of = Hls, js_name = isSupported, catch)]
    fn is_supported() -> std::result::Result<bool, JsValue>;

    #[wasm_bindgen(constructor, catch)]
    fn new(config: &JsValue) -> std::result::Result<Hls, JsValue>;

    #[wasm_bindgen(method, js_name = loadSource)]
    fn load_source(this: &Hls, url: &str);

    #[wasm_bindgen(method, js_name = attachMedia)]
    fn attach_media(this: &Hls, media: &web_sys::HtmlMediaElement);

    #[wasm_bindgen(method)]
    fn destroy(this: &Hls);
}

/// hls.js when the page has it and MSE works, else native HLS
pub fn library_available() -> bool {
    // A missing `Hls` global throws, which counts as unsupported
    Hls::is_supported().unwrap_or(false)
}

pub(crate) fn js_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Playback engine bound to one video tile
pub struct HlsJsEngine {
    container: Element,
    stream_id: StreamId,
    tuning: EngineTuning,
    video: Option<HtmlVideoElement>,
    hls: Option<Hls>,
    on_timeupdate: Option<Closure<dyn FnMut()>>,
}

impl HlsJsEngine {
    pub fn new(container: Element, stream_id: StreamId, tuning: EngineTuning) -> Self {
        Self {
            container,
            stream_id,
            tuning,
            video: None,
            hls: None,
            on_timeupdate: None,
        }
    }

    fn create_video(&self) -> Result<HtmlVideoElement> {
        let document = self
            .container
            .owner_document()
            .ok_or_else(|| Error::command("attach", "container is not in a document"))?;
        let video: HtmlVideoElement = document
            .create_element("video")
            .map_err(|e| Error::command("attach", js_message(&e)))?
            .dyn_into()
            .map_err(|_| Error::command("attach", "created element is not a video"))?;

        video.set_muted(true);
        video.set_controls(true);
        video.set_class_name("multiview-tile");
        // Best effort, only used by the page's styling
        let _ = video.set_attribute("playsinline", "");
        let _ = video.set_attribute("data-stream-id", &self.stream_id.to_string());

        self.container
            .append_child(&video)
            .map_err(|e| Error::command("attach", js_message(&e)))?;
        Ok(video)
    }

    fn video(&mut self) -> Result<&HtmlVideoElement> {
        if self.video.is_none() {
            self.video = Some(self.create_video()?);
        }
        self.video
            .as_ref()
            .ok_or_else(|| Error::command("attach", "video element unavailable"))
    }

    fn native_available(&self) -> bool {
        let probe = match &self.video {
            Some(video) => Some(video.clone()),
            None => self
                .container
                .owner_document()
                .and_then(|doc| doc.create_element("video").ok())
                .and_then(|el| el.dyn_into::<HtmlVideoElement>().ok()),
        };
        probe
            .map(|video| !video.can_play_type(HLS_MIME_TYPE).is_empty())
            .unwrap_or(false)
    }
}

impl PlaybackEngine for HlsJsEngine {
    fn name(&self) -> &str {
        "hls.js"
    }

    fn probe(&self, source: &StreamSource) -> EngineSupport {
        if !source.is_hls() {
            return EngineSupport::Unsupported;
        }
        select_support(library_available(), self.native_available())
    }

    fn attach(&mut self, source: &StreamSource, mut on_position: PositionListener) -> Result<EngineSupport> {
        let support = self.probe(source);
        let video = self.video()?.clone();

        match support {
            EngineSupport::Library => {
                let config = serde_wasm_bindgen::to_value(&self.tuning)
                    .map_err(|e| Error::command("attach", e.to_string()))?;
                let hls = Hls::new(&config).map_err(|e| Error::command("attach", js_message(&e)))?;
                hls.load_source(source.as_str());
                hls.attach_media(&video);
                self.hls = Some(hls);
            }
            EngineSupport::Native => video.set_src(source.as_str()),
            EngineSupport::Unsupported => {
                return Err(Error::UnsupportedSource {
                    engine: self.name().to_string(),
                    url: source.to_string(),
                });
            }
        }

        let reader = video.clone();
        let closure = Closure::<dyn FnMut()>::new(move || on_position(reader.current_time()));
        video
            .add_event_listener_with_callback("timeupdate", closure.as_ref().unchecked_ref())
            .map_err(|e| Error::command("attach", js_message(&e)))?;
        self.on_timeupdate = Some(closure);

        debug!(stream = self.stream_id, url = %source, ?support, "Video tile attached");
        Ok(support)
    }

    fn detach(&mut self) {
        let Some(video) = &self.video else {
            return;
        };

        // Listener first, so no report outlives the attachment
        if let Some(closure) = self.on_timeupdate.take() {
            let _ = video
                .remove_event_listener_with_callback("timeupdate", closure.as_ref().unchecked_ref());
        }

        if let Some(hls) = self.hls.take() {
            hls.destroy();
        } else if video.has_attribute("src") {
            let _ = video.remove_attribute("src");
            video.load();
        }
    }

    fn seek(&mut self, position: f64) {
        if let Some(video) = &self.video {
            video.set_current_time(position);
        }
    }

    fn play(&mut self) -> Result<()> {
        let video = self
            .video
            .as_ref()
            .ok_or_else(|| Error::command("play", "no video element"))?;
        let promise = video.play().map_err(|e| Error::command("play", js_message(&e)))?;

        // Autoplay rejections arrive asynchronously
        let stream = self.stream_id;
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                warn!(stream, error = %js_message(&e), "Play rejected, tile stays paused");
            }
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(video) = &self.video {
            if let Err(e) = video.pause() {
                warn!(stream = self.stream_id, error = %js_message(&e), "Pause failed");
            }
        }
    }

    fn position(&self) -> f64 {
        self.video.as_ref().map(|v| v.current_time()).unwrap_or(0.0)
    }

    fn is_paused(&self) -> bool {
        self.video.as_ref().map(|v| v.paused()).unwrap_or(true)
    }
}

impl Drop for HlsJsEngine {
    fn drop(&mut self) {
        self.detach();
        if let Some(video) = self.video.take() {
            video.remove();
        }
    }
}
