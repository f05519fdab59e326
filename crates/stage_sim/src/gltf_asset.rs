//! Binary glTF decoding for the headless host.
//!
//! Every node becomes an entity, numbered from 1 by node index. The first
//! root node of the default scene receives the world transform.

use ar_stage::{AnimationClip, AssetDecoder, AssetHandle, EntityId, StageError};

#[derive(Debug, Default)]
pub struct GltfDecoder;

fn entity_for(node: &gltf::Node<'_>) -> EntityId {
    EntityId(node.index() as u32 + 1)
}

impl AssetDecoder for GltfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AssetHandle, StageError> {
        let (document, buffers, _images) =
            gltf::import_slice(bytes).map_err(|e| StageError::AssetDecode(e.to_string()))?;

        let root = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .and_then(|scene| scene.nodes().next())
            .map(|node| entity_for(&node))
            .ok_or_else(|| StageError::AssetDecode("asset has no scene root".into()))?;

        let entities = document.nodes().map(|node| entity_for(&node)).collect();

        let clips = document
            .animations()
            .map(|animation| {
                let duration_secs = animation
                    .channels()
                    .filter_map(|channel| {
                        let reader = channel.reader(|buffer| {
                            buffers.get(buffer.index()).map(|data| data.0.as_slice())
                        });
                        reader.read_inputs()?.reduce(f32::max)
                    })
                    .fold(0.0, f32::max);
                AnimationClip {
                    name: animation.name().map(str::to_owned),
                    duration_secs,
                }
            })
            .collect();

        Ok(AssetHandle {
            root,
            entities,
            clips,
        })
    }

    fn upload_resources(&self, asset: &AssetHandle) -> Result<(), StageError> {
        tracing::debug!(
            entities = asset.entities.len(),
            "No GPU attached; skipping resource upload"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two nodes and a 2.5 s translation clip on the child, with the keyframe
    /// data inlined as a base64 buffer.
    const ANIMATED: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "root", "children": [1] }, { "name": "arm" }],
        "buffers": [{
            "byteLength": 32,
            "uri": "$KEYFRAMES"
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 8, "byteLength": 24 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR",
                "min": [0.0], "max": [2.5]
            },
            { "bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC3" }
        ],
        "animations": [{
            "name": "wave",
            "channels": [{ "sampler": 0, "target": { "node": 1, "path": "translation" } }],
            "samplers": [{ "input": 0, "output": 1 }]
        }]
    }"#;

    /// Times `[0, 2.5]` followed by two VEC3 translations.
    const KEYFRAMES: &str = concat!(
        "data:application/octet-stream;base64,",
        "AAAAAAAAIEAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAA="
    );

    #[test]
    fn decodes_nodes_and_clip_duration() {
        let json = ANIMATED.replace("$KEYFRAMES", KEYFRAMES);
        let asset = GltfDecoder.decode(json.as_bytes()).unwrap();

        assert_eq!(asset.root, EntityId(1));
        assert_eq!(asset.entities, vec![EntityId(1), EntityId(2)]);
        assert_eq!(
            asset.clips,
            vec![AnimationClip {
                name: Some("wave".into()),
                duration_secs: 2.5,
            }]
        );
        assert!(GltfDecoder.upload_resources(&asset).is_ok());
    }

    #[test]
    fn static_model_has_no_clips() {
        let json = r#"{
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "name": "statue" }]
        }"#;
        let asset = GltfDecoder.decode(json.as_bytes()).unwrap();
        assert_eq!(asset.root, EntityId(1));
        assert!(asset.clips.is_empty());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = GltfDecoder.decode(b"not a model").unwrap_err();
        assert!(matches!(err, StageError::AssetDecode(_)), "{err:?}");
    }

    #[test]
    fn empty_scene_is_rejected() {
        let json = r#"{ "asset": { "version": "2.0" } }"#;
        let err = GltfDecoder.decode(json.as_bytes()).unwrap_err();
        assert!(matches!(err, StageError::AssetDecode(_)), "{err:?}");
    }
}
