//! Scriptable tile providers for deterministic quadtree tests.

use std::sync::{Arc, Mutex};

use terrane_tiles::{
    AbortableFetch, DebugLayer, DebugProvider, FetchError, FetchResponder, FetchResult,
    TileCoord, TileProvider, encode_terrain_rgb,
};

enum Mode {
    /// Answer every request immediately.
    Respond(Box<dyn Fn(TileCoord) -> FetchResult + Send + Sync>),
    /// Keep requests open until the test releases them.
    Hold,
}

pub(crate) struct ScriptedProvider {
    max_level: u8,
    mode: Mode,
    ready: Mutex<bool>,
    calls: Mutex<Vec<TileCoord>>,
    held: Mutex<Vec<(TileCoord, FetchResponder)>>,
}

impl ScriptedProvider {
    fn with_mode(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            max_level: 18,
            mode,
            ready: Mutex::new(true),
            calls: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        })
    }

    /// Small debug imagery for every tile.
    pub(crate) fn imagery() -> Arc<Self> {
        let debug = DebugProvider::new(DebugLayer::Imagery, 20, 4, 0);
        Self::with_mode(Mode::Respond(Box::new(move |coord| {
            debug
                .fetch_tile(coord)
                .try_take()
                .unwrap_or(Err(FetchError::Cancelled))
        })))
    }

    /// Flat terrain-RGB tiles of 16 pixels at `height`.
    pub(crate) fn flat_elevation(height: f32) -> Arc<Self> {
        Self::with_mode(Mode::Respond(Box::new(move |_| Ok(flat_raster(height)))))
    }

    pub(crate) fn failing() -> Arc<Self> {
        Self::with_mode(Mode::Respond(Box::new(|_| {
            Err(FetchError::Status {
                status: 404,
                url: "test://missing".to_string(),
            })
        })))
    }

    pub(crate) fn holding() -> Arc<Self> {
        Self::with_mode(Mode::Hold)
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        *self.ready.lock().unwrap() = ready;
    }

    pub(crate) fn calls(&self) -> Vec<TileCoord> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Whether the held request for `coord` has been aborted by its owner.
    pub(crate) fn is_cancelled(&self, coord: TileCoord) -> bool {
        self.held
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == coord)
            .is_some_and(|(_, responder)| responder.is_cancelled())
    }

    /// Answer the held request for `coord`.
    pub(crate) fn release(&self, coord: TileCoord, result: FetchResult) {
        let mut held = self.held.lock().unwrap();
        let index = held
            .iter()
            .position(|(c, _)| *c == coord)
            .expect("no held request for tile");
        let (_, responder) = held.remove(index);
        responder.respond(result);
    }
}

impl TileProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn min_level(&self) -> u8 {
        0
    }

    fn max_level(&self) -> u8 {
        self.max_level
    }

    fn tile_size(&self) -> u32 {
        16
    }

    fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap()
    }

    fn fetch_tile(&self, coord: TileCoord) -> AbortableFetch {
        self.calls.lock().unwrap().push(coord);
        match &self.mode {
            Mode::Respond(respond) => AbortableFetch::ready(respond(coord)),
            Mode::Hold => {
                let (responder, fetch) = AbortableFetch::pending();
                self.held.lock().unwrap().push((coord, responder));
                fetch
            }
        }
    }
}

pub(crate) fn flat_raster(height: f32) -> Vec<u8> {
    encode_terrain_rgb(16, |_, _| height).unwrap()
}

pub(crate) fn debug_png() -> Vec<u8> {
    DebugProvider::new(DebugLayer::Imagery, 20, 4, 0)
        .fetch_tile(TileCoord::ROOT)
        .try_take()
        .unwrap()
        .unwrap()
}
