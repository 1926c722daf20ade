use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};

use crate::obj::{self, Mesh};

/// How the renderer treats a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectRole {
    /// Drawn once per frame with its manifest transform.
    #[default]
    Static,
    /// Template mesh instanced at every raindrop position.
    Raindrop,
    /// Small unlit cube riding on the light direction.
    LightMarker,
}

impl fmt::Display for ObjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectRole::Static => "static",
            ObjectRole::Raindrop => "raindrop",
            ObjectRole::LightMarker => "light-marker",
        };
        f.write_str(label)
    }
}

/// Drawable entry from the scene manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub role: ObjectRole,
    /// Mesh path relative to the manifest; `None` falls back to the built-in cube.
    pub mesh: Option<String>,
    pub color: Vec3,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            role: ObjectRole::Static,
            mesh: None,
            color: Vec3::ONE,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Tunables from the manifest's `<settings>` block.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSettings {
    pub window_width: u32,
    pub window_height: u32,
    pub camera_position: Vec3,
    pub camera_target: Vec3,
    pub camera_speed: f32,
    pub mouse_sensitivity: f32,
    pub light_direction: Vec3,
    pub light_color: Vec3,
    pub rain_count: usize,
    pub rain_seed: u32,
    pub fog_density: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            camera_position: Vec3::new(0.0, 2.0, 5.5),
            camera_target: Vec3::new(0.0, 2.0, 0.0),
            camera_speed: 0.1,
            mouse_sensitivity: 0.1,
            light_direction: Vec3::new(-0.16, 6.79, 4.31),
            light_color: Vec3::ONE,
            rain_count: 500,
            rain_seed: 7,
            fog_density: 0.05,
        }
    }
}

/// Parsed scene manifest.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneManifest {
    pub settings: SceneSettings,
    pub objects: Vec<SceneObject>,
}

impl SceneManifest {
    /// Reads and parses a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene manifest {}", path.display()))?;
        Self::from_xml(&xml)
            .with_context(|| format!("failed to parse scene manifest {}", path.display()))
    }

    /// Parses the manifest XML.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;

        let mut settings = SceneSettings::default();
        if let Some(node) = document
            .descendants()
            .find(|n| n.has_tag_name("settings"))
        {
            parse_settings(&node, &mut settings)?;
        }

        let mut objects = Vec::new();
        for node in document.descendants().filter(|n| n.has_tag_name("object")) {
            let defaults = SceneObject::default();
            let name = required_text(&node, "name")?;
            let role = parse_role(optional_text(&node, "role"))
                .with_context(|| format!("object {name}"))?;
            objects.push(SceneObject {
                role,
                mesh: optional_text(&node, "mesh"),
                color: parse_color(optional_text(&node, "color"), defaults.color)?,
                position: parse_vec3(optional_text(&node, "position"), defaults.position)?,
                rotation: parse_vec3(optional_text(&node, "rotation"), defaults.rotation)?,
                scale: parse_vec3(optional_text(&node, "scale"), defaults.scale)?,
                name,
            });
        }

        Ok(Self { settings, objects })
    }
}

fn parse_settings(node: &Node<'_, '_>, settings: &mut SceneSettings) -> Result<()> {
    if let Some(size) = optional_text(node, "window-size") {
        let (width, height) = parse_extent(&size)?;
        settings.window_width = width;
        settings.window_height = height;
    }
    settings.camera_position = parse_vec3(
        optional_text(node, "camera-position"),
        settings.camera_position,
    )?;
    settings.camera_target = parse_vec3(
        optional_text(node, "camera-target"),
        settings.camera_target,
    )?;
    settings.camera_speed = parse_f32(optional_text(node, "camera-speed"), settings.camera_speed)?;
    settings.mouse_sensitivity = parse_f32(
        optional_text(node, "mouse-sensitivity"),
        settings.mouse_sensitivity,
    )?;
    settings.light_direction = parse_vec3(
        optional_text(node, "light-direction"),
        settings.light_direction,
    )?;
    settings.light_color = parse_color(optional_text(node, "light-color"), settings.light_color)?;
    settings.rain_count = parse_usize(optional_text(node, "rain-count"), settings.rain_count)?;
    settings.rain_seed = parse_u32(optional_text(node, "rain-seed"), settings.rain_seed)?;
    settings.fog_density = parse_f32(optional_text(node, "fog-density"), settings.fog_density)?;
    Ok(())
}

fn parse_role(value: Option<String>) -> Result<ObjectRole> {
    let Some(value) = value else {
        return Ok(ObjectRole::Static);
    };
    match value.as_str() {
        "static" => Ok(ObjectRole::Static),
        "raindrop" => Ok(ObjectRole::Raindrop),
        "light-marker" => Ok(ObjectRole::LightMarker),
        other => Err(anyhow!("unknown object role {other:?}")),
    }
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok());
    let x = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let y = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let z = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    Ok(Vec3::new(x, y, z))
}

/// Colors are authored as 0-255 channel values.
fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let channels = parse_vec3(Some(value), default * 255.0)?;
    Ok(channels / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_u32(value: Option<String>, default: u32) -> Result<u32> {
    match value {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse integer: {err}")),
        None => Ok(default),
    }
}

fn parse_usize(value: Option<String>, default: usize) -> Result<usize> {
    parse_u32(value, default as u32).map(|count| count as usize)
}

fn parse_extent(value: &str) -> Result<(u32, u32)> {
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<u32>().ok());
    let width = numbers
        .next()
        .ok_or_else(|| anyhow!("window size needs width and height"))?;
    let height = numbers
        .next()
        .ok_or_else(|| anyhow!("window size needs width and height"))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("window size must be non-zero"));
    }
    Ok((width, height))
}

/// Scene object paired with its parsed mesh, ready for GPU upload.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedObject {
    pub object: SceneObject,
    pub mesh: Mesh,
}

/// Everything the renderer needs, loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAssets {
    pub settings: SceneSettings,
    pub objects: Vec<LoadedObject>,
}

impl SceneAssets {
    /// Loads every mesh the manifest references, resolving paths against
    /// `base`. Objects without a mesh get the built-in cube. Any unreadable
    /// or malformed mesh file fails the whole load.
    pub fn load(manifest: &SceneManifest, base: &Path) -> Result<Self> {
        let mut objects = Vec::with_capacity(manifest.objects.len());
        for object in &manifest.objects {
            let mesh = match &object.mesh {
                Some(relative) => obj::load_obj(&base.join(relative))
                    .with_context(|| format!("object {}", object.name))?,
                None => obj::builtin_cube(),
            };
            objects.push(LoadedObject {
                object: object.clone(),
                mesh,
            });
        }
        Ok(Self {
            settings: manifest.settings.clone(),
            objects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = r#"
    <scene>
        <settings>
            <window-size>1024 768</window-size>
            <camera-position>0 2 5.5</camera-position>
            <camera-target>0 2 0</camera-target>
            <camera-speed>0.2</camera-speed>
            <light-direction>-0.16 6.79 4.31</light-direction>
            <light-color>255 128 0</light-color>
            <rain-count>300</rain-count>
        </settings>
        <object>
            <name>Ground</name>
            <mesh>meshes/ground.obj</mesh>
            <color>64 64 64</color>
            <scale>2 1 2</scale>
        </object>
        <object>
            <name>Drop</name>
            <role>raindrop</role>
            <mesh>meshes/raindrop.obj</mesh>
            <rotation>0 0 90</rotation>
        </object>
        <object>
            <name>Sun</name>
            <role>light-marker</role>
        </object>
    </scene>
    "#;

    #[test]
    fn parses_settings_and_objects() {
        let manifest = SceneManifest::from_xml(SAMPLE).unwrap();
        assert_eq!(manifest.settings.window_width, 1024);
        assert_eq!(manifest.settings.window_height, 768);
        assert_eq!(manifest.settings.camera_speed, 0.2);
        assert_eq!(manifest.settings.rain_count, 300);
        assert_eq!(
            manifest.settings.light_color,
            Vec3::new(1.0, 128.0 / 255.0, 0.0)
        );
        assert_eq!(manifest.objects.len(), 3);

        let ground = &manifest.objects[0];
        assert_eq!(ground.role, ObjectRole::Static);
        assert_eq!(ground.mesh.as_deref(), Some("meshes/ground.obj"));
        assert_eq!(ground.color, Vec3::splat(64.0 / 255.0));
        assert_eq!(ground.scale, Vec3::new(2.0, 1.0, 2.0));

        let drop = &manifest.objects[1];
        assert_eq!(drop.role, ObjectRole::Raindrop);
        assert_eq!(drop.rotation, Vec3::new(0.0, 0.0, 90.0));

        let sun = &manifest.objects[2];
        assert_eq!(sun.role, ObjectRole::LightMarker);
        assert_eq!(sun.mesh, None);
    }

    #[test]
    fn missing_settings_block_falls_back_to_defaults() {
        let manifest =
            SceneManifest::from_xml("<scene><object><name>A</name></object></scene>").unwrap();
        assert_eq!(manifest.settings, SceneSettings::default());
    }

    #[test]
    fn unset_object_fields_keep_defaults() {
        let manifest =
            SceneManifest::from_xml("<scene><object><name>A</name></object></scene>").unwrap();
        let object = &manifest.objects[0];
        assert_eq!(object.color, Vec3::ONE);
        assert_eq!(object.position, Vec3::ZERO);
        assert_eq!(object.scale, Vec3::ONE);
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><role>static</role></object></scene>";
        assert!(SceneManifest::from_xml(bad).is_err());
    }

    #[test]
    fn unknown_role_is_an_error() {
        let bad = "<scene><object><name>A</name><role>fancy</role></object></scene>";
        let err = SceneManifest::from_xml(bad).unwrap_err();
        assert!(format!("{err:#}").contains("unknown object role"));
    }

    #[test]
    fn zero_window_size_is_an_error() {
        let bad = "<scene><settings><window-size>0 720</window-size></settings></scene>";
        assert!(SceneManifest::from_xml(bad).is_err());
    }

    #[test]
    fn load_assets_reads_meshes_and_falls_back_to_cube() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tri.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();
        let manifest = SceneManifest::from_xml(
            "<scene>\
                <object><name>Tri</name><mesh>tri.obj</mesh></object>\
                <object><name>Box</name></object>\
             </scene>",
        )
        .unwrap();

        let assets = SceneAssets::load(&manifest, dir.path()).unwrap();
        assert_eq!(assets.objects.len(), 2);
        assert_eq!(assets.objects[0].mesh.triangle_count(), 1);
        assert_eq!(assets.objects[1].mesh.vertices.len(), 24);
    }

    #[test]
    fn load_assets_fails_on_missing_mesh_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = SceneManifest::from_xml(
            "<scene><object><name>Gone</name><mesh>gone.obj</mesh></object></scene>",
        )
        .unwrap();
        let err = SceneAssets::load(&manifest, dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Gone"));
    }
}
