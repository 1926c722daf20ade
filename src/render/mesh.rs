use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::obj::{Mesh, Vertex};

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];

/// Slot 0: interleaved position/normal, advancing per vertex.
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Slot 1: world-space position offset, advancing per instance.
///
/// Static objects bind a single zero offset here; the rain binds one offset
/// per drop.
pub fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: (3 * std::mem::size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    }
}

/// Vertex and index buffers for one uploaded mesh.
pub struct GpuMesh {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Flattens drop positions into the instance buffer layout.
pub fn pack_instances(drops: &[Vec3]) -> Vec<f32> {
    let mut data = Vec::with_capacity(drops.len() * 3);
    for drop in drops {
        data.extend_from_slice(&drop.to_array());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_instances_are_three_floats_per_drop() {
        let drops = [Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 5.0, -6.0)];
        let packed = pack_instances(&drops);
        assert_eq!(packed, vec![1.0, 2.0, 3.0, -4.0, 5.0, -6.0]);
    }

    #[test]
    fn layouts_cover_their_strides() {
        let vertex = vertex_layout();
        assert_eq!(vertex.array_stride, 24);
        assert_eq!(vertex.attributes.len(), 2);
        let instance = instance_layout();
        assert_eq!(instance.array_stride, 12);
        assert_eq!(instance.step_mode, wgpu::VertexStepMode::Instance);
    }
}
