use nalgebra::{Unit, Vector2, Vector3};

use crate::error::DecodeError;
use crate::lantern::scene::{Geometry, GeometryKind, Material, MaterialKind, Plane, Sphere};

// every entity is [u32 size][tag][payload], little-endian words
pub const PREFIX_SIZE: u32 = 4;
pub const WORD_SIZE: u32 = 4;
// xyz plus a zero word
pub const VEC3_SIZE: u32 = 16;
pub const VEC2_SIZE: u32 = 8;

// nesting limit for host-side decoding, keeps the recursion and the decoded tree shallow
pub const MAX_DECODE_DEPTH: usize = 64;

pub trait GpuSerializable {
    // tag and payload, without the outer length prefix
    fn encoded_size(&self) -> u32;

    fn write(&self, sink: &mut ByteSink<'_>);
}

pub fn bytes_required<T: GpuSerializable + ?Sized>(entity: &T) -> u32 {
    PREFIX_SIZE + entity.encoded_size()
}

pub fn encode<T: GpuSerializable + ?Sized>(root: &T) -> Vec<u8> {
    let mut buffer = vec![0; bytes_required(root) as usize];
    ByteSink::new(&mut buffer).append(root);
    buffer
}

// no prefix, zero padded to the 16 byte uniform granularity
pub fn uniform_bytes<T: GpuSerializable + ?Sized>(record: &T) -> Vec<u8> {
    let mut buffer = vec![0; uniform_size(record.encoded_size()) as usize];
    record.write(&mut ByteSink::new(&mut buffer));
    buffer
}

pub const fn uniform_size(encoded: u32) -> u64 {
    ((encoded as u64 + 15) / 16) * 16
}

// Writing past the end means encoded_size and write disagree, so it panics instead of truncating.
pub struct ByteSink<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> ByteSink<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    // returns the offset of the prefix
    pub fn append<T: GpuSerializable + ?Sized>(&mut self, entity: &T) -> usize {
        let start = self.offset;
        let size = entity.encoded_size();

        self.put_u32(size);
        entity.write(self);

        let written = self.offset - start - PREFIX_SIZE as usize;
        assert_eq!(
            written, size as usize,
            "entity at byte {start} reported {size} bytes but wrote {written}"
        );
        start
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_f32(&mut self, value: f32) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_vec2(&mut self, value: &Vector2<f32>) {
        self.put_f32(value.x);
        self.put_f32(value.y);
    }

    pub fn put_vec3(&mut self, value: &Vector3<f32>) {
        self.put_f32(value.x);
        self.put_f32(value.y);
        self.put_f32(value.z);
        self.put_f32(0.0);
    }

    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        let next = self.offset + bytes.len();
        if next > self.buffer.len() {
            panic!(
                "scene buffer overflow, limit={} next={}",
                self.buffer.len(),
                next
            );
        }

        self.buffer[self.offset..next].copy_from_slice(bytes);
        self.offset = next;
    }
}

pub fn decode_scene(bytes: &[u8]) -> Result<Geometry, DecodeError> {
    let mut reader = SceneReader::new(bytes);
    let root = reader.read_prefixed_geometry()?;

    match reader.remaining() {
        0 => Ok(root),
        trailing => Err(DecodeError::TrailingBytes(trailing)),
    }
}

// host-side mirror of the kernel's walk
pub struct SceneReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> SceneReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    // hops over one entity using its prefix alone
    pub fn skip_entity(&mut self) -> Result<u32, DecodeError> {
        let size = self.read_u32()?;
        self.take(size as usize)?;
        Ok(size)
    }

    pub fn read_prefixed_geometry(&mut self) -> Result<Geometry, DecodeError> {
        self.read_nested(1)
    }

    fn read_nested(&mut self, depth: usize) -> Result<Geometry, DecodeError> {
        let start = self.offset;
        if depth > MAX_DECODE_DEPTH {
            return Err(DecodeError::TooDeep { offset: start });
        }
        let declared = self.read_u32()?;
        let body = self.offset;

        let geometry = self.read_geometry(depth)?;

        let actual = (self.offset - body) as u32;
        if actual != declared {
            return Err(DecodeError::SizeMismatch {
                offset: start,
                declared,
                actual,
            });
        }
        Ok(geometry)
    }

    fn read_geometry(&mut self, depth: usize) -> Result<Geometry, DecodeError> {
        let offset = self.offset;
        let tag = self.read_u32()?;

        match GeometryKind::from_tag(tag) {
            Some(GeometryKind::Group) => {
                let count = self.read_u32()?;
                // each child needs at least a prefix and a tag
                let mut children = Vec::with_capacity((count as usize).min(self.remaining() / 8));
                for _ in 0..count {
                    children.push(self.read_nested(depth + 1)?);
                }
                Ok(Geometry::Group(children))
            }
            Some(GeometryKind::Sphere) => {
                let center = self.read_vec3()?;
                let radius = self.read_f32()?;
                let material = self.read_material()?;
                Ok(Geometry::Sphere(Sphere {
                    center,
                    radius,
                    material,
                }))
            }
            Some(GeometryKind::Plane) => {
                let point = self.read_vec3()?;
                // stored normals are already unit length, keep the exact bits
                let normal = Unit::new_unchecked(self.read_vec3()?);
                let material = self.read_material()?;
                Ok(Geometry::Plane(Plane::from_unit_normal(point, normal, material)))
            }
            None => Err(DecodeError::UnknownGeometryTag { tag, offset }),
        }
    }

    pub fn read_material(&mut self) -> Result<Material, DecodeError> {
        let offset = self.offset;
        let tag = self.read_u32()?;

        let material = match MaterialKind::from_tag(tag) {
            Some(MaterialKind::Lambertian) => Material::Lambertian {
                albedo: self.read_vec3()?,
                texture_index: self.read_i32()?,
            },
            Some(MaterialKind::Metal) => Material::Metal {
                albedo: self.read_vec3()?,
                fuzz: self.read_f32()?,
                texture_index: self.read_i32()?,
            },
            Some(MaterialKind::Dielectric) => Material::Dielectric {
                refractive_index: self.read_f32()?,
                fuzz: self.read_f32()?,
                texture_index: self.read_i32()?,
            },
            Some(MaterialKind::LightSource) => Material::LightSource {
                color: self.read_vec3()?,
                texture_index: self.read_i32()?,
            },
            None => return Err(DecodeError::UnknownMaterialTag { tag, offset }),
        };
        Ok(material)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.word()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.word()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.word()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vector3<f32>, DecodeError> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        self.read_f32()?; // padding
        Ok(Vector3::new(x, y, z))
    }

    fn word(&mut self) -> Result<[u8; 4], DecodeError> {
        let bytes = self.take(WORD_SIZE as usize)?;
        let mut word = [0; 4];
        word.copy_from_slice(bytes);
        Ok(word)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEnd {
                offset: self.offset,
                needed: len - self.remaining(),
            });
        }

        let bytes = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_material(rng: &mut StdRng) -> Material {
        let color = Vector3::new(rng.gen(), rng.gen(), rng.gen());
        let texture_index = if rng.gen_bool(0.3) { rng.gen_range(0..8) } else { -1 };
        match rng.gen_range(0..4) {
            0 => Material::Lambertian {
                albedo: color,
                texture_index,
            },
            1 => Material::Metal {
                albedo: color,
                fuzz: rng.gen(),
                texture_index,
            },
            2 => Material::Dielectric {
                refractive_index: rng.gen_range(1.0..2.5),
                fuzz: rng.gen(),
                texture_index,
            },
            _ => Material::LightSource {
                color: color * 4.0,
                texture_index,
            },
        }
    }

    fn random_tree(rng: &mut StdRng, depth: u32) -> Geometry {
        let choice = if depth == 0 { rng.gen_range(1..3) } else { rng.gen_range(0..3) };
        match choice {
            0 => {
                let count = rng.gen_range(0..5);
                Geometry::group((0..count).map(|_| random_tree(rng, depth - 1)))
            }
            1 => Geometry::sphere(
                Vector3::new(rng.gen_range(-100.0..100.0), rng.gen(), rng.gen()),
                rng.gen_range(1.0..50.0),
                random_material(rng),
            ),
            _ => Geometry::plane(
                Vector3::new(rng.gen(), rng.gen_range(-10.0..0.0), rng.gen()),
                Vector3::new(rng.gen_range(-1.0..1.0), 1.0, rng.gen_range(-1.0..1.0)),
                random_material(rng),
            ),
        }
    }

    fn assert_size_matches(entity: &Geometry) {
        let mut buffer = vec![0; bytes_required(entity) as usize];
        let mut sink = ByteSink::new(&mut buffer);
        entity.write(&mut sink);
        assert_eq!(sink.offset(), entity.encoded_size() as usize);

        if let Geometry::Group(children) = entity {
            children.iter().for_each(assert_size_matches);
        }
    }

    #[test]
    fn written_bytes_match_encoded_size_for_random_trees() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..64 {
            let tree = random_tree(&mut rng, 5);
            assert_size_matches(&tree);
            assert_eq!(encode(&tree).len(), bytes_required(&tree) as usize);
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let tree = random_tree(&mut rng, 5);
        assert_eq!(encode(&tree), encode(&tree));
    }

    #[test]
    fn decoding_reconstructs_random_trees() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..64 {
            let tree = random_tree(&mut rng, 5);
            let decoded = decode_scene(&encode(&tree)).unwrap();
            assert_eq!(decoded, tree);
        }
    }

    #[test]
    fn sphere_layout_is_pinned() {
        let sphere = Geometry::sphere(
            Vector3::new(1.0, 2.0, 3.0),
            4.0,
            Material::lambertian(Vector3::new(0.5, 0.25, 0.125)),
        );
        let bytes = encode(&sphere);
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        assert_eq!(words.len(), 1 + 12);
        assert_eq!(words[0], 48); // tag + vec3 + radius + lambertian(24)
        assert_eq!(words[1], GeometryKind::Sphere as u32);
        assert_eq!(f32::from_bits(words[2]), 1.0);
        assert_eq!(f32::from_bits(words[4]), 3.0);
        assert_eq!(words[5], 0); // vec3 padding
        assert_eq!(f32::from_bits(words[6]), 4.0);
        assert_eq!(words[7], MaterialKind::Lambertian as u32);
        assert_eq!(f32::from_bits(words[8]), 0.5);
        assert_eq!(words[12] as i32, -1);
    }

    #[test]
    fn group_size_counts_child_prefixes() {
        let material = Material::metal(Vector3::new(0.8, 0.8, 0.8), 0.1);
        let sphere = Geometry::sphere(Vector3::zeros(), 1.0, material);
        let group = Geometry::group([sphere.clone(), Geometry::group([]), sphere.clone()]);

        let expected = 4 + 4 + (4 + sphere.encoded_size()) + (4 + 8) + (4 + sphere.encoded_size());
        assert_eq!(group.encoded_size(), expected);
    }

    #[test]
    fn children_keep_insertion_order() {
        let a = Geometry::sphere(Vector3::new(1.0, 0.0, 0.0), 1.0, Material::light(Vector3::x()));
        let b = Geometry::sphere(Vector3::new(2.0, 0.0, 0.0), 1.0, Material::dielectric(1.5));
        let bytes = encode(&Geometry::group([a.clone(), b.clone()]));

        let mut reader = SceneReader::new(&bytes);
        reader.read_u32().unwrap(); // root prefix
        reader.read_u32().unwrap(); // group tag
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.read_prefixed_geometry().unwrap(), a);
        assert_eq!(reader.read_prefixed_geometry().unwrap(), b);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn skip_uses_prefix_only() {
        let nested = Geometry::group([Geometry::group([Geometry::sphere(
            Vector3::zeros(),
            3.0,
            Material::lambertian(Vector3::y()),
        )])]);
        let bytes = encode(&Geometry::group([nested.clone(), Geometry::group([])]));

        let mut reader = SceneReader::new(&bytes);
        reader.read_u32().unwrap();
        reader.read_u32().unwrap();
        reader.read_u32().unwrap();
        assert_eq!(reader.skip_entity().unwrap(), nested.encoded_size());
        assert_eq!(reader.read_prefixed_geometry().unwrap(), Geometry::group([]));
    }

    #[test]
    #[should_panic(expected = "scene buffer overflow")]
    fn writing_past_capacity_panics() {
        let sphere = Geometry::sphere(Vector3::zeros(), 1.0, Material::dielectric(1.3));
        let mut buffer = vec![0; bytes_required(&sphere) as usize - 4];
        ByteSink::new(&mut buffer).append(&sphere);
    }

    #[test]
    fn rewind_rewrites_identical_bytes() {
        let tree = Geometry::group([Geometry::plane(
            Vector3::zeros(),
            Vector3::y(),
            Material::lambertian(Vector3::z()),
        )]);
        let mut buffer = vec![0; bytes_required(&tree) as usize];
        let mut sink = ByteSink::new(&mut buffer);
        sink.append(&tree);
        sink.rewind();
        assert_eq!(sink.append(&tree), 0);
        assert_eq!(buffer, encode(&tree));
    }

    #[test]
    fn decode_rejects_malformed_buffers() {
        let sphere = Geometry::sphere(Vector3::zeros(), 1.0, Material::lambertian(Vector3::x()));
        let bytes = encode(&sphere);

        assert!(matches!(
            decode_scene(&bytes[..bytes.len() - 2]),
            Err(DecodeError::UnexpectedEnd { .. })
        ));

        let mut unknown = bytes.clone();
        unknown[4..8].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(
            decode_scene(&unknown),
            Err(DecodeError::UnknownGeometryTag { tag: 9, offset: 4 })
        );

        let mut bad_material = bytes.clone();
        bad_material[28..32].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            decode_scene(&bad_material),
            Err(DecodeError::UnknownMaterialTag { tag: 0, offset: 28 })
        );

        let mut lying_prefix = bytes.clone();
        lying_prefix.extend_from_slice(&[0; 4]);
        lying_prefix[0..4].copy_from_slice(&52u32.to_le_bytes());
        assert!(matches!(
            decode_scene(&lying_prefix),
            Err(DecodeError::SizeMismatch {
                declared: 52,
                actual: 48,
                ..
            })
        ));

        let mut trailing = bytes;
        trailing.extend_from_slice(&[0; 8]);
        assert_eq!(decode_scene(&trailing), Err(DecodeError::TrailingBytes(8)));
    }

    // `levels` groups, each holding the next, the innermost one empty
    fn nested_groups(levels: usize) -> Vec<u8> {
        let mut sizes = vec![8u32; levels];
        for level in (0..levels.saturating_sub(1)).rev() {
            sizes[level] = 8 + 4 + sizes[level + 1];
        }

        let mut bytes = Vec::with_capacity(levels * 12);
        for (level, size) in sizes.iter().enumerate() {
            let count = u32::from(level + 1 < levels);
            for word in [*size, GeometryKind::Group as u32, count] {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn decode_accepts_nesting_up_to_limit() {
        let bytes = nested_groups(MAX_DECODE_DEPTH);
        let root = decode_scene(&bytes).unwrap();

        let mut depth = 0;
        let mut node = &root;
        while let Geometry::Group(children) = node {
            depth += 1;
            match children.first() {
                Some(child) => node = child,
                None => break,
            }
        }
        assert_eq!(depth, MAX_DECODE_DEPTH);
    }

    #[test]
    fn decode_rejects_runaway_nesting() {
        let first_too_deep = DecodeError::TooDeep {
            offset: MAX_DECODE_DEPTH * 12,
        };
        assert_eq!(
            decode_scene(&nested_groups(MAX_DECODE_DEPTH + 1)),
            Err(first_too_deep.clone())
        );
        assert_eq!(decode_scene(&nested_groups(300_000)), Err(first_too_deep));
    }

    #[test]
    fn skip_hops_over_deep_nesting() {
        let bytes = nested_groups(300_000);
        let mut reader = SceneReader::new(&bytes);
        assert_eq!(reader.skip_entity().unwrap() as usize, bytes.len() - 4);
        assert_eq!(reader.remaining(), 0);
    }
}
