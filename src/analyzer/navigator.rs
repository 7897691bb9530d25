//! Navigation controller
//!
//! [`Analyzer`] ties a [`DecodeSession`] to the distributor and the compositor.
//! Every operation that changes the current picture or the view leaves the
//! display buffer showing the result.

use super::bits::{BitDistributor, BitReport, SymbolFilter};
use super::compositor::Compositor;
use super::session::{DecodeSession, SessionState};
use super::view::ViewState;
use super::AnalyzerConfig;
use crate::codec::{FrameGeometry, VideoCodec};
use crate::error::{Error, Result};
use crate::format::ByteSource;
use crate::util::colorspace::{dering_gain, dering_legend};
use crate::util::PlaneMask;
use tracing::{debug, info, warn};

/// Text shown next to the picture for one probed position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeStatus {
    /// Decoded `Y:..,U:..,V:..` triple, when the position is inside the picture
    pub sample: Option<String>,
    /// Deringing gain or bit cost, depending on the active overlay
    pub detail: String,
    /// `X:..,Y:..` in decoded pixels
    pub position: String,
}

/// Interactive analyzer over one stream
pub struct Analyzer<S: ByteSource> {
    session: DecodeSession<S>,
    compositor: Compositor,
    bits: Option<BitDistributor>,
    report: Option<BitReport>,
}

impl<S: ByteSource> Analyzer<S> {
    /// Open `source` and show its first picture
    pub fn open(codec: Box<dyn VideoCodec>, source: S, config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let mut session = DecodeSession::new(codec, config.bit_accounting);
        session.open(source)?;

        let view = ViewState {
            zoom: config.zoom,
            show_padding: config.show_padding,
            filter: SymbolFilter::new(&config.filter),
            ..Default::default()
        };
        let mut analyzer = Analyzer {
            session,
            compositor: Compositor::new(view),
            bits: None,
            report: None,
        };
        analyzer.establish_geometry()?;
        analyzer.next_frame()?;
        Ok(analyzer)
    }

    fn establish_geometry(&mut self) -> Result<()> {
        let geometry = *self.geometry()?;
        self.compositor.set_geometry(geometry)?;
        // A distributor for the same frame size carries its last total over
        self.bits = match self.bits.take() {
            _ if !self.session.accounting_enabled() => None,
            Some(bits) if bits.fits(&geometry) => Some(bits),
            _ => Some(BitDistributor::new(&geometry)?),
        };
        self.report = None;
        Ok(())
    }

    fn geometry(&self) -> Result<&FrameGeometry> {
        self.session
            .geometry()
            .ok_or_else(|| Error::invalid_state("No stream is open"))
    }

    /// Decode the next picture and show it
    ///
    /// On failure the previous picture stays on display.
    pub fn next_frame(&mut self) -> Result<()> {
        self.session.step()?;
        self.refresh()
    }

    /// Recompute the bit-cost map and recomposite the current picture
    pub fn refresh(&mut self) -> Result<()> {
        if let Some(bits) = self.bits.as_mut() {
            let frame = self.session.picture_index().unwrap_or(0);
            let report = bits.distribute(self.session.accounting(), &self.compositor.view().filter, frame);
            self.report = Some(report);
        }
        self.render()
    }

    fn render(&mut self) -> Result<()> {
        let picture = match self.session.picture() {
            Some(picture) => picture,
            None => return Ok(()),
        };
        let map = self.bits.as_ref().map(|b| b.map());
        self.compositor.render(picture, self.session.grids(), map)
    }

    /// Seek to picture `n` by stepping forward, restarting first when `n` lies
    /// behind the current picture
    ///
    /// Running out of pictures restarts at picture 0 and reports
    /// [`Error::SeekPastEnd`].
    pub fn goto_frame(&mut self, n: i64) -> Result<()> {
        let current = self.session.picture_index().map_or(-1, |i| i as i64);
        if n < current || self.session.state() == SessionState::Failed {
            self.restart()?;
        }
        if n <= 0 {
            return Ok(());
        }

        let target = n as u64;
        let mut stepped = false;
        while self.session.picture_index().map_or(true, |i| i < target) {
            match self.session.step() {
                Ok(_) => stepped = true,
                Err(Error::EndOfStream) => {
                    let available = self.session.picture_count();
                    warn!("Picture {} requested, stream has {}", target, available);
                    self.restart()?;
                    return Err(Error::SeekPastEnd {
                        requested: target,
                        available,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Seeked to picture {}", target);
        if stepped {
            self.refresh()?;
        }
        Ok(())
    }

    /// Start over from the beginning of the stream and show picture 0
    pub fn restart(&mut self) -> Result<()> {
        self.session.restart()?;
        self.establish_geometry()?;
        self.next_frame()
    }

    /// Replace the symbol filter; returns whether it changed
    pub fn set_filter(&mut self, text: &str) -> Result<bool> {
        if !self.compositor.set_filter(text) {
            return Ok(false);
        }
        info!("Symbol filter: '{}'", text);
        self.refresh()?;
        Ok(true)
    }

    /// Clear every overlay and the filter
    pub fn reset_view(&mut self) -> Result<()> {
        self.compositor.reset_view()?;
        self.refresh()
    }

    /// Change the zoom factor
    pub fn set_zoom(&mut self, zoom: usize) -> Result<()> {
        if zoom == self.compositor.view().zoom {
            return Ok(());
        }
        self.compositor.set_zoom(zoom)?;
        self.render()
    }

    pub fn set_show_padding(&mut self, show: bool) -> Result<()> {
        self.compositor.set_show_padding(show)?;
        self.render()
    }

    pub fn set_show_blocks(&mut self, show: bool) -> Result<()> {
        self.compositor.set_show_blocks(show);
        self.render()
    }

    pub fn set_show_motion(&mut self, show: bool) -> Result<()> {
        self.compositor.set_show_motion(show);
        self.render()
    }

    pub fn set_show_skip(&mut self, show: bool) -> Result<()> {
        self.compositor.set_show_skip(show);
        self.render()
    }

    pub fn set_show_noref(&mut self, show: bool) -> Result<()> {
        self.compositor.set_show_noref(show);
        self.render()
    }

    /// Show the bit-cost heat map; needs accounting from the decoder
    pub fn set_show_bits(&mut self, show: bool) -> Result<()> {
        if show && self.bits.is_none() {
            return Err(Error::unsupported("Bit accounting is not enabled for this stream"));
        }
        self.compositor.set_show_bits(show);
        self.render()
    }

    pub fn set_show_dering(&mut self, show: bool) -> Result<()> {
        if show {
            info!("Deringing levels: {}", dering_legend());
        }
        self.compositor.set_show_dering(show);
        self.render()
    }

    pub fn set_plane_visible(&mut self, planes: PlaneMask, visible: bool) -> Result<()> {
        self.compositor.set_plane_visible(planes, visible);
        self.render()
    }

    /// Status strings for display position (`x`, `y`)
    pub fn probe(&self, x: usize, y: usize) -> ProbeStatus {
        let view = self.compositor.view();
        let (i, j) = (x / view.zoom, y / view.zoom);
        let (dw, dh) = self.compositor.decode_size();
        let mut status = ProbeStatus {
            position: format!("X:{},Y:{}", i, j),
            ..Default::default()
        };
        let picture = match self.session.picture() {
            Some(picture) if i < dw && j < dh => picture,
            _ => return status,
        };

        status.sample = Some(picture.sample(i, j).to_string());
        if view.show_dering {
            if let Some(level) = self.session.grids().dering_at(i, j) {
                status.detail = format!("Dering:{:0.3}", dering_gain(level));
            }
        } else if view.show_bits {
            if let Some(bits) = &self.bits {
                status.detail = format!("bpp:{:0.1}", bits.map().get(i, j));
            }
        }
        status
    }

    /// Window title: source name, picture size and index
    pub fn title(&self) -> String {
        let name = self.session.source_name().unwrap_or_default();
        let (w, h) = self
            .session
            .info()
            .map_or((0, 0), |info| (info.pic_width, info.pic_height));
        format!(
            "{} ({},{}) Frame {}",
            name,
            w,
            h,
            self.session.picture_index().unwrap_or(0)
        )
    }

    /// Whether the padded frame is larger than the picture
    pub fn has_padding(&self) -> bool {
        self.session.geometry().map_or(false, |g| g.has_padding())
    }

    pub fn picture_index(&self) -> Option<u64> {
        self.session.picture_index()
    }

    /// Composited RGB buffer
    pub fn pixels(&self) -> &[u8] {
        self.compositor.pixels()
    }

    pub fn display_size(&self) -> (usize, usize) {
        self.compositor.display_size()
    }

    /// Bit-accounting report of the current picture
    pub fn report(&self) -> Option<&BitReport> {
        self.report.as_ref()
    }

    pub fn view(&self) -> &ViewState {
        self.compositor.view()
    }

    pub fn session(&self) -> &DecodeSession<S> {
        &self.session
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }
}
