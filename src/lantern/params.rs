use nalgebra::{Vector2, Vector3};

use crate::lantern::serialize::{ByteSink, GpuSerializable, VEC2_SIZE, VEC3_SIZE, WORD_SIZE};

// u and v span the focal plane at full screen extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub position: Vector3<f32>,
    pub focal_plane_origin: Vector3<f32>,
    pub u: Vector3<f32>,
    pub v: Vector3<f32>,
    pub aperture: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            focal_plane_origin: Vector3::zeros(),
            u: Vector3::zeros(),
            v: Vector3::zeros(),
            aperture: 0.0,
        }
    }
}

impl GpuSerializable for CameraParams {
    fn encoded_size(&self) -> u32 {
        VEC3_SIZE * 4 + WORD_SIZE
    }

    fn write(&self, sink: &mut ByteSink<'_>) {
        sink.put_vec3(&self.position);
        sink.put_vec3(&self.focal_plane_origin);
        sink.put_vec3(&self.u);
        sink.put_vec3(&self.v);
        sink.put_f32(self.aperture);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayTracingParams {
    pub screen_size: Vector2<f32>,
    pub sample_batch_size: i32,
    pub cur_batch_idx: i32,
    pub max_depth: i32,
}

impl Default for RayTracingParams {
    fn default() -> Self {
        Self {
            screen_size: Vector2::zeros(),
            sample_batch_size: 8,
            cur_batch_idx: 0,
            max_depth: 50,
        }
    }
}

impl GpuSerializable for RayTracingParams {
    fn encoded_size(&self) -> u32 {
        VEC2_SIZE + WORD_SIZE * 3
    }

    fn write(&self, sink: &mut ByteSink<'_>) {
        sink.put_vec2(&self.screen_size);
        sink.put_i32(self.sample_batch_size);
        sink.put_i32(self.cur_batch_idx);
        sink.put_i32(self.max_depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::lantern::serialize::uniform_bytes;

    fn word(bytes: &[u8], index: usize) -> [u8; 4] {
        let mut word = [0; 4];
        word.copy_from_slice(&bytes[index * 4..index * 4 + 4]);
        word
    }

    #[test]
    fn camera_block_layout() {
        let params = CameraParams {
            position: Vector3::new(1.0, 2.0, 3.0),
            focal_plane_origin: Vector3::new(4.0, 5.0, 6.0),
            u: Vector3::new(7.0, 0.0, 0.0),
            v: Vector3::new(0.0, 8.0, 0.0),
            aperture: 12.0,
        };
        let bytes = uniform_bytes(&params);

        assert_eq!(params.encoded_size(), 68);
        assert_eq!(bytes.len(), 80);
        assert_eq!(f32::from_le_bytes(word(&bytes, 0)), 1.0);
        assert_eq!(f32::from_le_bytes(word(&bytes, 4)), 4.0);
        assert_eq!(f32::from_le_bytes(word(&bytes, 8)), 7.0);
        assert_eq!(f32::from_le_bytes(word(&bytes, 13)), 8.0);
        assert_eq!(f32::from_le_bytes(word(&bytes, 16)), 12.0);
        assert!(bytes[68..].iter().all(|b| *b == 0));
    }

    #[test]
    fn ray_tracing_block_layout() {
        let params = RayTracingParams {
            screen_size: Vector2::new(1280.0, 720.0),
            sample_batch_size: 8,
            cur_batch_idx: 3,
            max_depth: 50,
        };
        let bytes = uniform_bytes(&params);

        assert_eq!(bytes.len(), 32);
        assert_eq!(f32::from_le_bytes(word(&bytes, 0)), 1280.0);
        assert_eq!(f32::from_le_bytes(word(&bytes, 1)), 720.0);
        assert_eq!(i32::from_le_bytes(word(&bytes, 2)), 8);
        assert_eq!(i32::from_le_bytes(word(&bytes, 3)), 3);
        assert_eq!(i32::from_le_bytes(word(&bytes, 4)), 50);
    }
}
