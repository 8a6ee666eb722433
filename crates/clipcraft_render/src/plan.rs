use std::collections::HashMap;
use std::path::PathBuf;

use clipcraft_core::{
    BlendMode, Filter, Look, Overlay, OverlayAnimation, OverlayContent, Point, Rotation, Segment,
    TimeUs, Transform,
};
use serde::{Deserialize, Serialize};

use crate::backend::RenderJob;
use crate::error::{RenderError, Result};
use crate::options::ExportFormat;

/// Length of overlay entry/exit animations, in seconds.
const ANIMATION_SECS: f64 = 0.3;

/// A compiled render plan ready for ffmpeg execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPlan {
    pub inputs: Vec<RenderInput>,
    pub filter_graph: String,
    pub output_args: Vec<String>,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderInput {
    pub path: PathBuf,
    pub index: usize,
}

/// Deduplicates inputs by source location.
#[derive(Default)]
struct InputTable {
    inputs: Vec<RenderInput>,
    by_location: HashMap<String, usize>,
}

impl InputTable {
    fn index_for(&mut self, location: &str) -> usize {
        if let Some(&idx) = self.by_location.get(location) {
            return idx;
        }
        let idx = self.inputs.len();
        self.by_location.insert(location.to_string(), idx);
        self.inputs.push(RenderInput {
            path: PathBuf::from(location),
            index: idx,
        });
        idx
    }
}

/// Compile a render job into an ffmpeg render plan.
///
/// Segments are trimmed, retimed, graded and fitted to the output frame, then
/// concatenated. Transitions become a fade out of the outgoing segment and a
/// fade in of the incoming one, centred on the cut, so output timing matches
/// the composition exactly. Picture-in-picture layers and stickers are
/// composited with `overlay`; text and emoji use `drawtext`.
pub fn compile(job: &RenderJob) -> Result<RenderPlan> {
    let comp = &job.composition;
    if comp.segments.is_empty() {
        return Err(RenderError::NoComposition);
    }

    let (w, h, fps) = (job.params.width, job.params.height, job.params.fps);
    let mut inputs = InputTable::default();
    let mut filters: Vec<String> = Vec::new();

    let count = comp.segments.len();
    let mut fade_in: Vec<Option<TimeUs>> = vec![None; count];
    let mut fade_out: Vec<Option<TimeUs>> = vec![None; count];
    for tr in &comp.transitions {
        let out_half = tr.duration / 2;
        fade_out[tr.from_segment] = Some(out_half);
        fade_in[tr.to_segment] = Some(tr.duration - out_half);
    }

    // ---- Main sequence ----

    for (i, seg) in comp.segments.iter().enumerate() {
        let input_idx = inputs.index_for(seg.source.as_str());

        let mut chain = video_chain(seg);
        chain.push(format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1"
        ));
        chain.push(format!("fps={fps}"));
        if let Some(d) = fade_in[i] {
            chain.push(format!("fade=t=in:st=0:d={}", d.as_seconds()));
        }
        if let Some(d) = fade_out[i] {
            chain.push(format!(
                "fade=t=out:st={}:d={}",
                (seg.output_duration - d).as_seconds(),
                d.as_seconds()
            ));
        }
        filters.push(format!("[{input_idx}:v]{}[v{i}]", chain.join(",")));

        let has_audio = !job.silent_sources.contains(&seg.source);
        filters.push(audio_chain(i, input_idx, seg, has_audio, fade_in[i], fade_out[i]));
    }

    let mut concat_inputs = String::new();
    for i in 0..count {
        concat_inputs.push_str(&format!("[v{i}][a{i}]"));
    }
    filters.push(format!("{concat_inputs}concat=n={count}:v=1:a=1[base][outa]"));
    let mut current = "base".to_string();

    // ---- Picture-in-picture ----

    for (j, layer) in comp.pip.iter().enumerate() {
        let seg = &layer.segment;
        let input_idx = inputs.index_for(seg.source.as_str());
        let pw = even((w as f64 * layer.frame.width).round() as u32);
        let ph = even((h as f64 * layer.frame.height).round() as u32);
        let px = (w as f64 * layer.frame.x).round() as u32;
        let py = (h as f64 * layer.frame.y).round() as u32;

        let mut chain = video_chain(seg);
        chain.push(format!("scale={pw}:{ph},setsar=1"));
        chain.push(format!("setpts=PTS+{}/TB", seg.output_start.as_seconds()));
        filters.push(format!("[{input_idx}:v]{}[pip{j}]", chain.join(",")));

        let enable = between(seg.output_start, seg.output_end());
        let next = format!("pv{j}");
        match blend_mode_name(layer.blend_mode) {
            None => filters.push(format!(
                "[{current}][pip{j}]overlay=x={px}:y={py}:eof_action=pass:enable='{enable}'[{next}]"
            )),
            Some(mode) => {
                filters.push(format!("[{current}]split[pb{j}][pc{j}]"));
                filters.push(format!("[pc{j}]crop={pw}:{ph}:{px}:{py}[pr{j}]"));
                filters.push(format!("[pip{j}][pr{j}]blend=all_mode={mode}[pm{j}]"));
                filters.push(format!(
                    "[pb{j}][pm{j}]overlay=x={px}:y={py}:eof_action=pass:enable='{enable}'[{next}]"
                ));
            }
        }
        current = next;
    }

    // ---- Overlays ----

    let mut drawtext_filters = Vec::new();
    for (k, overlay) in comp.overlays.iter().enumerate() {
        let anchor = overlay.position.anchor();
        match &overlay.content {
            OverlayContent::Text {
                text,
                font_size,
                color,
            } => drawtext_filters.push(drawtext(text, *font_size, color, anchor, overlay)),
            OverlayContent::Emoji { glyph, font_size } => {
                drawtext_filters.push(drawtext(glyph, *font_size, "#ffffff", anchor, overlay))
            }
            OverlayContent::Sticker { source, scale } => {
                let input_idx = inputs.index_for(source.as_str());
                let sw = even((w as f64 * scale).round() as u32);
                filters.push(format!("[{input_idx}:v]scale={sw}:-1,format=rgba[st{k}]"));
                let next = format!("sv{k}");
                filters.push(format!(
                    "[{current}][st{k}]overlay=x=main_w*{ax}-overlay_w/2:y=main_h*{ay}-overlay_h/2:enable='{enable}'[{next}]",
                    ax = anchor.x,
                    ay = anchor.y,
                    enable = between(overlay.start, overlay.end()),
                ));
                current = next;
            }
        }
    }
    if !drawtext_filters.is_empty() {
        filters.push(format!("[{current}]{}[txt]", drawtext_filters.join(",")));
        current = "txt".to_string();
    }

    let filter_graph = filters.join(";");
    let output_args = output_args(&current, job);

    tracing::debug!(
        segments = count,
        transitions = comp.transitions.len(),
        overlays = comp.overlays.len(),
        pip = comp.pip.len(),
        "compiled render plan"
    );

    Ok(RenderPlan {
        inputs: inputs.inputs,
        filter_graph,
        output_args,
        output_path: job.output.clone(),
    })
}

/// Build ffmpeg args from a render plan.
pub fn build_ffmpeg_args(plan: &RenderPlan) -> Vec<String> {
    // Progress goes to stdout as key=value blocks; stderr keeps only logs.
    let mut args: Vec<String> = ["-y", "-nostats", "-progress", "pipe:1"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for input in &plan.inputs {
        args.push("-i".to_string());
        args.push(input.path.to_string_lossy().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(plan.filter_graph.clone());

    args.extend(plan.output_args.clone());

    args.push(plan.output_path.to_string_lossy().to_string());

    args
}

// ---------------------------------------------------------------------------
// Filter builders
// ---------------------------------------------------------------------------

/// Trim, retime, crop, orient and grade one segment's video.
fn video_chain(seg: &Segment) -> Vec<String> {
    let range = seg.source_range;
    let mut chain = vec![
        format!(
            "trim=start={}:end={}",
            range.start.as_seconds(),
            range.end.as_seconds()
        ),
        "setpts=PTS-STARTPTS".to_string(),
    ];
    if seg.reversed {
        chain.push("reverse".to_string());
    }
    if seg.speed != 1.0 {
        chain.push(format!("setpts=PTS/{}", seg.speed));
    }
    if let Some(c) = seg.crop {
        chain.push(format!(
            "crop=iw*{}:ih*{}:iw*{}:ih*{}",
            c.width, c.height, c.x, c.y
        ));
    }
    chain.extend(transform_filters(seg.transform));
    chain.extend(look_filters(&seg.look));
    chain
}

fn transform_filters(t: Transform) -> Vec<String> {
    let mut out = Vec::new();
    let (mut hflip, mut vflip) = (t.flip_horizontal, t.flip_vertical);
    match t.rotation {
        Rotation::None => {}
        Rotation::Cw90 => out.push("transpose=clock".to_string()),
        Rotation::Cw270 => out.push("transpose=cclock".to_string()),
        Rotation::Cw180 => {
            hflip = !hflip;
            vflip = !vflip;
        }
    }
    if hflip {
        out.push("hflip".to_string());
    }
    if vflip {
        out.push("vflip".to_string());
    }
    out
}

fn look_filters(look: &Look) -> Vec<String> {
    let mut out: Vec<String> = match look.filter {
        Filter::None => vec![],
        Filter::Mono => vec!["hue=s=0".into()],
        Filter::Sepia => vec![
            "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131".into(),
        ],
        Filter::Noir => vec!["hue=s=0".into(), "eq=contrast=1.5:brightness=-0.05".into()],
        Filter::Vivid => vec!["eq=saturation=1.5:contrast=1.1".into()],
        Filter::Fade => vec!["eq=contrast=0.8:brightness=0.05:saturation=0.7".into()],
        Filter::Chrome => vec!["eq=contrast=1.2:saturation=1.2".into()],
        Filter::Warm => vec!["colortemperature=temperature=5000".into()],
        Filter::Cool => vec!["colortemperature=temperature=8000".into()],
    };

    let adj = look.adjustments;
    if adj.brightness != 0.0 || adj.contrast != 1.0 || adj.saturation != 1.0 {
        out.push(format!(
            "eq=brightness={}:contrast={}:saturation={}",
            adj.brightness, adj.contrast, adj.saturation
        ));
    }
    if adj.temperature != 0.0 {
        // 6500K is neutral; lower is warmer.
        let kelvin = (6500.0 - adj.temperature * 3000.0).round();
        out.push(format!("colortemperature=temperature={kelvin}"));
    }
    out
}

/// Audio for one segment, always exactly `output_duration` long so the
/// concat stays aligned. Silent segments get generated silence.
fn audio_chain(
    i: usize,
    input_idx: usize,
    seg: &Segment,
    has_audio: bool,
    fade_in: Option<TimeUs>,
    fade_out: Option<TimeUs>,
) -> String {
    let out_secs = seg.output_duration.as_seconds();
    let range = match seg.audio_range {
        Some(r) if has_audio => r,
        _ => return format!("anullsrc=r=48000:cl=stereo,atrim=end={out_secs}[a{i}]"),
    };

    let mut chain = vec![
        format!(
            "atrim=start={}:end={}",
            range.start.as_seconds(),
            range.end.as_seconds()
        ),
        "asetpts=PTS-STARTPTS".to_string(),
    ];
    if seg.reversed {
        chain.push("areverse".to_string());
    }
    chain.extend(atempo_chain(seg.speed));
    if seg.volume != 1.0 {
        chain.push(format!("volume={}", seg.volume));
    }

    let lead = if seg.reversed {
        seg.source_range.end - range.end
    } else {
        range.start - seg.source_range.start
    }
    .scale_by_speed(seg.speed);
    if lead > TimeUs::ZERO {
        chain.push(format!("adelay={}:all=1", lead.0 / 1_000));
    }
    chain.push("apad".to_string());
    chain.push(format!("atrim=end={out_secs}"));

    if let Some(d) = fade_in {
        chain.push(format!("afade=t=in:st=0:d={}", d.as_seconds()));
    }
    if let Some(d) = fade_out {
        chain.push(format!(
            "afade=t=out:st={}:d={}",
            (seg.output_duration - d).as_seconds(),
            d.as_seconds()
        ));
    }
    chain.push("aformat=sample_rates=48000:channel_layouts=stereo".to_string());

    format!("[{input_idx}:a]{}[a{i}]", chain.join(","))
}

/// `atempo` only accepts factors in `[0.5, 2.0]`; larger changes are chained.
fn atempo_chain(speed: f64) -> Vec<String> {
    if speed == 1.0 {
        return Vec::new();
    }
    let mut factors = Vec::new();
    let mut rest = speed;
    while rest > 2.0 {
        factors.push(2.0);
        rest /= 2.0;
    }
    while rest < 0.5 {
        factors.push(0.5);
        rest /= 0.5;
    }
    factors.push(rest);
    factors.into_iter().map(|f| format!("atempo={f}")).collect()
}

fn drawtext(text: &str, font_size: u32, color: &str, anchor: Point, overlay: &Overlay) -> String {
    let start = overlay.start.as_seconds();
    let end = overlay.end().as_seconds();
    let escaped_text = escape_drawtext(text);
    let ffmpeg_color = color.strip_prefix('#').unwrap_or(color);
    let anim = ANIMATION_SECS.min((end - start) / 2.0);

    let mut y = format!("h*{}-text_h/2", anchor.y);
    if overlay.animation == OverlayAnimation::SlideUp {
        y.push_str(&format!("+h*0.05*max(0,1-(t-{start})/{anim})"));
    }

    let mut filter = format!(
        "drawtext=text='{escaped_text}':fontsize={font_size}:fontcolor=0x{ffmpeg_color}:x=w*{}-text_w/2:y='{y}':enable='between(t,{start},{end})'",
        anchor.x
    );
    if let Some(alpha) = alpha_expr(overlay.animation, start, end, anim) {
        filter.push_str(&format!(":alpha='{alpha}'"));
    }
    filter
}

/// Quote `text` for a single-quoted drawtext value. Backslashes go first so
/// the escapes added afterwards survive; `%` would otherwise start a text
/// expansion.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

fn alpha_expr(animation: OverlayAnimation, start: f64, end: f64, anim: f64) -> Option<String> {
    let fade_in = format!("(t-{start})/{anim}");
    let fade_out = format!("({end}-t)/{anim}");
    match animation {
        OverlayAnimation::None => None,
        OverlayAnimation::FadeIn
        | OverlayAnimation::SlideUp
        | OverlayAnimation::Pop
        | OverlayAnimation::Bounce => Some(format!("min(1,{fade_in})")),
        OverlayAnimation::FadeOut => Some(format!("min(1,{fade_out})")),
        OverlayAnimation::FadeInOut => Some(format!("min(1,min({fade_in},{fade_out}))")),
    }
}

fn blend_mode_name(mode: BlendMode) -> Option<&'static str> {
    match mode {
        BlendMode::Normal => None,
        BlendMode::Multiply => Some("multiply"),
        BlendMode::Screen => Some("screen"),
        BlendMode::Overlay => Some("overlay"),
        BlendMode::Darken => Some("darken"),
        BlendMode::Lighten => Some("lighten"),
        BlendMode::Difference => Some("difference"),
        BlendMode::Add => Some("addition"),
    }
}

fn output_args(video_label: &str, job: &RenderJob) -> Vec<String> {
    let p = &job.params;
    let mut args: Vec<String> = vec![
        "-map".into(),
        format!("[{video_label}]"),
        "-map".into(),
        "[outa]".into(),
        "-c:v".into(),
        p.format.video_encoder().into(),
        "-crf".into(),
        p.crf.to_string(),
        "-maxrate".into(),
        format!("{}k", p.video_bitrate),
        "-bufsize".into(),
        format!("{}k", p.video_bitrate * 2),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-ar".into(),
        "48000".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        p.fps.to_string(),
    ];
    match p.format {
        ExportFormat::Hevc => args.extend(["-tag:v".into(), "hvc1".into()]),
        ExportFormat::Mp4 | ExportFormat::Mov => {}
    }
    args.extend(["-movflags".into(), "+faststart".into()]);
    args
}

fn between(start: TimeUs, end: TimeUs) -> String {
    format!("between(t,{},{})", start.as_seconds(), end.as_seconds())
}

fn even(v: u32) -> u32 {
    (v + (v % 2)).max(2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use clipcraft_core::{
        AspectRatio, ClipId, CompositionBuilder, OverlayPosition, PipPlacement, Rect, SourceRef,
        Timeline, TransitionKind, VideoClip,
    };

    use crate::options::{preset_1080p, ExportOptions, ExportQuality};

    fn clip(path: &str, secs: f64) -> VideoClip {
        VideoClip::new(SourceRef::new(path), TimeUs::from_seconds(secs)).unwrap()
    }

    fn timeline(clips: Vec<VideoClip>) -> (Timeline, Vec<ClipId>) {
        let mut tl = Timeline::new();
        let ids = tl.add_clips(clips).unwrap();
        (tl, ids)
    }

    fn job_for(tl: &Timeline, options: ExportOptions) -> RenderJob {
        RenderJob {
            composition: Arc::new(CompositionBuilder::build(tl).unwrap()),
            params: options.resolve(tl.aspect_ratio()),
            output: PathBuf::from("/tmp/out.mp4"),
            silent_sources: HashSet::new(),
        }
    }

    #[test]
    fn compile_one_clip_produces_valid_filter_graph() {
        let (mut tl, ids) = timeline(vec![clip("/tmp/clip.mp4", 10.0)]);
        tl.trim_clip(ids[0], TimeUs::from_seconds(1.0), TimeUs::from_seconds(5.0))
            .unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();

        assert_eq!(plan.inputs.len(), 1);
        assert_eq!(plan.inputs[0].path, PathBuf::from("/tmp/clip.mp4"));
        assert!(plan.filter_graph.contains("trim=start=1:end=5"));
        assert!(plan.filter_graph.contains("setpts=PTS-STARTPTS"));
        assert!(plan.filter_graph.contains("atrim=start=1:end=5"));
        assert!(plan.filter_graph.contains("scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(plan.filter_graph.contains("concat=n=1:v=1:a=1[base][outa]"));
        assert_eq!(plan.output_path, PathBuf::from("/tmp/out.mp4"));
    }

    #[test]
    fn compile_deduplicates_same_source() {
        let (tl, _) = timeline(vec![
            clip("/tmp/a.mp4", 4.0),
            clip("/tmp/a.mp4", 4.0),
            clip("/tmp/b.mp4", 4.0),
        ]);
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert_eq!(plan.inputs.len(), 2);
        assert!(plan.filter_graph.contains("[0:v]"));
        assert!(plan.filter_graph.contains("[1:v]"));
        assert!(plan.filter_graph.contains("concat=n=3:v=1:a=1"));
    }

    #[test]
    fn compile_applies_speed_and_reverse() {
        let (mut tl, ids) = timeline(vec![clip("/tmp/a.mp4", 8.0)]);
        tl.set_speed(ids[0], 4.0).unwrap();
        tl.set_reversed(ids[0], true).unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert!(plan.filter_graph.contains("reverse,setpts=PTS/4"));
        assert!(plan.filter_graph.contains("areverse,atempo=2,atempo=2"));
        assert!(plan.filter_graph.contains("atrim=end=2"));
    }

    #[test]
    fn compile_applies_crop_transform_and_look() {
        let (mut tl, ids) = timeline(vec![clip("/tmp/a.mp4", 8.0)]);
        tl.set_crop(ids[0], Some(Rect { x: 0.25, y: 0.0, width: 0.5, height: 1.0 }))
            .unwrap();
        tl.set_transform(
            ids[0],
            Transform {
                rotation: Rotation::Cw90,
                flip_horizontal: true,
                flip_vertical: false,
            },
        )
        .unwrap();
        tl.set_filter(ids[0], Filter::Mono).unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert!(plan.filter_graph.contains("crop=iw*0.5:ih*1:iw*0.25:ih*0"));
        assert!(plan.filter_graph.contains("transpose=clock,hflip"));
        assert!(plan.filter_graph.contains("hue=s=0"));
    }

    #[test]
    fn rotation_180_is_double_flip() {
        let t = Transform {
            rotation: Rotation::Cw180,
            flip_horizontal: true,
            flip_vertical: false,
        };
        assert_eq!(transform_filters(t), vec!["vflip".to_string()]);
    }

    #[test]
    fn transitions_become_fades_around_the_cut() {
        let (mut tl, ids) = timeline(vec![clip("/tmp/a.mp4", 4.0), clip("/tmp/b.mp4", 4.0)]);
        tl.add_transition(TransitionKind::Fade, ids[0], ids[1], TimeUs::from_seconds(1.0))
            .unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert!(plan.filter_graph.contains("fade=t=out:st=3.5:d=0.5"));
        assert!(plan.filter_graph.contains("fade=t=in:st=0:d=0.5"));
        assert!(plan.filter_graph.contains("afade=t=out:st=3.5:d=0.5"));
    }

    #[test]
    fn deleted_audio_and_silent_sources_use_silence() {
        let (mut tl, ids) = timeline(vec![clip("/tmp/a.mp4", 4.0), clip("/tmp/b.mp4", 2.0)]);
        tl.delete_audio(ids[0]).unwrap();
        let mut job = job_for(&tl, preset_1080p());
        job.silent_sources.insert(SourceRef::new("/tmp/b.mp4"));
        let plan = compile(&job).unwrap();
        assert!(plan.filter_graph.contains("anullsrc=r=48000:cl=stereo,atrim=end=4[a0]"));
        assert!(plan.filter_graph.contains("anullsrc=r=48000:cl=stereo,atrim=end=2[a1]"));
        assert!(!plan.filter_graph.contains(":a]"));
    }

    #[test]
    fn audio_trim_delays_and_pads() {
        let (mut tl, ids) = timeline(vec![clip("/tmp/a.mp4", 10.0)]);
        tl.trim_audio(ids[0], Some((TimeUs::from_seconds(2.0), TimeUs::from_seconds(5.0))))
            .unwrap();
        tl.set_volume(ids[0], 0.5).unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert!(plan.filter_graph.contains("atrim=start=2:end=5"));
        assert!(plan.filter_graph.contains("volume=0.5"));
        assert!(plan.filter_graph.contains("adelay=2000:all=1,apad,atrim=end=10"));
    }

    #[test]
    fn text_overlay_uses_drawtext_with_animation() {
        let (mut tl, _) = timeline(vec![clip("/tmp/a.mp4", 10.0)]);
        let overlay = Overlay::text("It's 5:00", TimeUs::from_seconds(1.0), TimeUs::from_seconds(2.0))
            .unwrap()
            .with_position(OverlayPosition::Bottom)
            .with_animation(OverlayAnimation::FadeIn);
        tl.add_overlay(overlay).unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert!(plan.filter_graph.contains("drawtext=text='It'\\''s 5\\:00'"));
        assert!(plan.filter_graph.contains("fontcolor=0xffffff"));
        assert!(plan.filter_graph.contains("enable='between(t,1,3)'"));
        assert!(plan.filter_graph.contains("alpha='min(1,(t-1)/0.3)'"));
        assert!(plan.filter_graph.ends_with("[txt]"));
        assert!(plan.output_args.contains(&"[txt]".to_string()));
    }

    #[test]
    fn text_overlay_escapes_percent_and_backslash() {
        let (mut tl, _) = timeline(vec![clip("/tmp/a.mp4", 10.0)]);
        let overlay = Overlay::text(r"50% off C:\sale", TimeUs::ZERO, TimeUs::from_seconds(2.0))
            .unwrap();
        tl.add_overlay(overlay).unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert!(plan
            .filter_graph
            .contains(r"drawtext=text='50\% off C\:\\sale'"));
    }

    #[test]
    fn sticker_is_an_extra_input() {
        let (mut tl, _) = timeline(vec![clip("/tmp/a.mp4", 10.0)]);
        let sticker = Overlay::new(
            OverlayContent::Sticker {
                source: SourceRef::new("/tmp/star.png"),
                scale: 0.25,
            },
            TimeUs::ZERO,
            TimeUs::from_seconds(2.0),
        )
        .unwrap();
        tl.add_overlay(sticker).unwrap();
        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert_eq!(plan.inputs.len(), 2);
        assert!(plan.filter_graph.contains("[1:v]scale=480:-1,format=rgba[st0]"));
        assert!(plan.filter_graph.contains("[base][st0]overlay="));
        assert!(plan.output_args.contains(&"[sv0]".to_string()));
    }

    #[test]
    fn pip_layers_overlay_or_blend() {
        let (mut tl, _) = timeline(vec![clip("/tmp/a.mp4", 10.0)]);
        let placement = PipPlacement {
            frame: Rect { x: 0.5, y: 0.5, width: 0.25, height: 0.25 },
            start: TimeUs::from_seconds(1.0),
            duration: TimeUs::from_seconds(3.0),
        };
        tl.add_pip(clip("/tmp/pip.mp4", 5.0), placement).unwrap();
        let mut blended = clip("/tmp/pip2.mp4", 5.0);
        blended.set_blend_mode(BlendMode::Screen);
        tl.add_pip(blended, placement).unwrap();

        let plan = compile(&job_for(&tl, preset_1080p())).unwrap();
        assert!(plan.filter_graph.contains("scale=480:270,setsar=1,setpts=PTS+1/TB[pip0]"));
        assert!(plan
            .filter_graph
            .contains("[base][pip0]overlay=x=960:y=540:eof_action=pass:enable='between(t,1,4)'[pv0]"));
        assert!(plan.filter_graph.contains("[pip1][pr1]blend=all_mode=screen[pm1]"));
        assert!(plan.output_args.contains(&"[pv1]".to_string()));
    }

    #[test]
    fn output_args_follow_params() {
        let (mut tl, _) = timeline(vec![clip("/tmp/a.mp4", 3.0)]);
        tl.set_aspect_ratio(AspectRatio::Vertical);
        let options = ExportOptions {
            quality: ExportQuality::Hd720p,
            format: ExportFormat::Hevc,
            ..ExportOptions::default()
        };
        let plan = compile(&job_for(&tl, options)).unwrap();
        assert!(plan.filter_graph.contains("scale=720:1280"));
        let args = plan.output_args.join(" ");
        assert!(args.contains("-c:v libx265"));
        assert!(args.contains("-tag:v hvc1"));
        assert!(args.contains("-crf 23"));
        assert!(args.contains("-r 30"));
    }

    #[test]
    fn atempo_chain_splits_out_of_range_factors() {
        assert!(atempo_chain(1.0).is_empty());
        assert_eq!(atempo_chain(1.5), vec!["atempo=1.5"]);
        assert_eq!(atempo_chain(0.25), vec!["atempo=0.5", "atempo=0.5"]);
        assert_eq!(atempo_chain(3.0), vec!["atempo=2", "atempo=1.5"]);
    }

    #[test]
    fn build_ffmpeg_args_includes_expected_flags() {
        let plan = RenderPlan {
            inputs: vec![
                RenderInput {
                    path: PathBuf::from("/tmp/a.mp4"),
                    index: 0,
                },
                RenderInput {
                    path: PathBuf::from("/tmp/b.mp4"),
                    index: 1,
                },
            ],
            filter_graph: "[0:v]trim=0:5[v0];[0:a]atrim=0:5[a0];[v0][a0]concat=n=1:v=1:a=1[base][outa]".to_string(),
            output_args: vec![
                "-map".to_string(), "[base]".to_string(),
                "-map".to_string(), "[outa]".to_string(),
            ],
            output_path: PathBuf::from("/tmp/out.mp4"),
        };

        let args = build_ffmpeg_args(&plan);

        assert_eq!(&args[..4], ["-y", "-nostats", "-progress", "pipe:1"]);
        assert!(args.contains(&"/tmp/a.mp4".to_string()));
        assert!(args.contains(&"/tmp/b.mp4".to_string()));
        assert!(args.contains(&"-filter_complex".to_string()));
        assert!(args.contains(&"[base]".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }
}
