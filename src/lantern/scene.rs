use nalgebra::{Unit, Vector2, Vector3};
use rand::Rng;

use crate::lantern::serialize::{ByteSink, GpuSerializable, PREFIX_SIZE, VEC3_SIZE, WORD_SIZE};
use crate::util::random_vec;

// texture_index meaning "use the scalar field directly"
pub const NO_TEXTURE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MaterialKind {
    Lambertian = 1,
    Metal = 2,
    Dielectric = 3,
    LightSource = 4,
}

impl MaterialKind {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::Lambertian),
            2 => Some(Self::Metal),
            3 => Some(Self::Dielectric),
            4 => Some(Self::LightSource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    Lambertian {
        albedo: Vector3<f32>,
        texture_index: i32,
    },
    Metal {
        albedo: Vector3<f32>,
        fuzz: f32,
        texture_index: i32,
    },
    Dielectric {
        refractive_index: f32,
        fuzz: f32,
        texture_index: i32,
    },
    LightSource {
        color: Vector3<f32>,
        texture_index: i32,
    },
}

impl Material {
    pub fn lambertian(albedo: Vector3<f32>) -> Self {
        Self::Lambertian {
            albedo,
            texture_index: NO_TEXTURE,
        }
    }

    pub fn metal(albedo: Vector3<f32>, fuzz: f32) -> Self {
        Self::Metal {
            albedo,
            fuzz,
            texture_index: NO_TEXTURE,
        }
    }

    pub fn dielectric(refractive_index: f32) -> Self {
        Self::Dielectric {
            refractive_index,
            fuzz: 0.0,
            texture_index: NO_TEXTURE,
        }
    }

    pub fn light(color: Vector3<f32>) -> Self {
        Self::LightSource {
            color,
            texture_index: NO_TEXTURE,
        }
    }

    pub fn kind(&self) -> MaterialKind {
        match self {
            Self::Lambertian { .. } => MaterialKind::Lambertian,
            Self::Metal { .. } => MaterialKind::Metal,
            Self::Dielectric { .. } => MaterialKind::Dielectric,
            Self::LightSource { .. } => MaterialKind::LightSource,
        }
    }

    pub fn texture_index(&self) -> Option<u32> {
        let index = match *self {
            Self::Lambertian { texture_index, .. }
            | Self::Metal { texture_index, .. }
            | Self::Dielectric { texture_index, .. }
            | Self::LightSource { texture_index, .. } => texture_index,
        };
        u32::try_from(index).ok()
    }
}

impl GpuSerializable for Material {
    fn encoded_size(&self) -> u32 {
        WORD_SIZE
            + match self {
                Self::Lambertian { .. } => VEC3_SIZE + WORD_SIZE,
                Self::Metal { .. } => VEC3_SIZE + WORD_SIZE + WORD_SIZE,
                Self::Dielectric { .. } => WORD_SIZE * 3,
                Self::LightSource { .. } => VEC3_SIZE + WORD_SIZE,
            }
    }

    fn write(&self, sink: &mut ByteSink<'_>) {
        sink.put_u32(self.kind() as u32);
        match self {
            Self::Lambertian {
                albedo,
                texture_index,
            } => {
                sink.put_vec3(albedo);
                sink.put_i32(*texture_index);
            }
            Self::Metal {
                albedo,
                fuzz,
                texture_index,
            } => {
                sink.put_vec3(albedo);
                sink.put_f32(*fuzz);
                sink.put_i32(*texture_index);
            }
            Self::Dielectric {
                refractive_index,
                fuzz,
                texture_index,
            } => {
                sink.put_f32(*refractive_index);
                sink.put_f32(*fuzz);
                sink.put_i32(*texture_index);
            }
            Self::LightSource {
                color,
                texture_index,
            } => {
                sink.put_vec3(color);
                sink.put_i32(*texture_index);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GeometryKind {
    Group = 0,
    Sphere = 1,
    Plane = 2,
}

impl GeometryKind {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Group),
            1 => Some(Self::Sphere),
            2 => Some(Self::Plane),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    pub center: Vector3<f32>,
    pub radius: f32,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub point: Vector3<f32>,
    normal: Unit<Vector3<f32>>,
    pub material: Material,
}

impl Plane {
    // panics on a zero normal, any other length is normalized
    pub fn new(point: Vector3<f32>, normal: Vector3<f32>, material: Material) -> Self {
        let normal = Unit::try_new(normal, 0.0)
            .unwrap_or_else(|| panic!("plane normal must be non-zero, got {normal:?}"));
        Self::from_unit_normal(point, normal, material)
    }

    pub(crate) fn from_unit_normal(
        point: Vector3<f32>,
        normal: Unit<Vector3<f32>>,
        material: Material,
    ) -> Self {
        Self {
            point,
            normal,
            material,
        }
    }

    pub fn normal(&self) -> &Unit<Vector3<f32>> {
        &self.normal
    }
}

// child order is the traversal order on the GPU
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Group(Vec<Geometry>),
    Sphere(Sphere),
    Plane(Plane),
}

impl Geometry {
    pub fn group(children: impl IntoIterator<Item = Geometry>) -> Self {
        Self::Group(children.into_iter().collect())
    }

    pub fn push(&mut self, child: Geometry) {
        match self {
            Self::Group(children) => children.push(child),
            leaf => panic!("cannot add a child to a {:?} node", leaf.kind()),
        }
    }

    pub fn sphere(center: Vector3<f32>, radius: f32, material: Material) -> Self {
        Self::Sphere(Sphere {
            center,
            radius,
            material,
        })
    }

    pub fn plane(point: Vector3<f32>, normal: Vector3<f32>, material: Material) -> Self {
        Self::Plane(Plane::new(point, normal, material))
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Group(_) => GeometryKind::Group,
            Self::Sphere(_) => GeometryKind::Sphere,
            Self::Plane(_) => GeometryKind::Plane,
        }
    }

    pub fn primitive_count(&self) -> usize {
        match self {
            Self::Group(children) => children.iter().map(Self::primitive_count).sum(),
            _ => 1,
        }
    }
}

impl GpuSerializable for Geometry {
    fn encoded_size(&self) -> u32 {
        WORD_SIZE
            + match self {
                // child count, then every child behind its own prefix
                Self::Group(children) => {
                    WORD_SIZE
                        + children
                            .iter()
                            .map(|child| PREFIX_SIZE + child.encoded_size())
                            .sum::<u32>()
                }
                Self::Sphere(sphere) => VEC3_SIZE + WORD_SIZE + sphere.material.encoded_size(),
                Self::Plane(plane) => VEC3_SIZE * 2 + plane.material.encoded_size(),
            }
    }

    fn write(&self, sink: &mut ByteSink<'_>) {
        sink.put_u32(self.kind() as u32);
        match self {
            Self::Group(children) => {
                sink.put_u32(children.len() as u32);
                for child in children {
                    sink.append(child);
                }
            }
            Self::Sphere(sphere) => {
                sink.put_vec3(&sphere.center);
                sink.put_f32(sphere.radius);
                sphere.material.write(sink);
            }
            Self::Plane(plane) => {
                sink.put_vec3(&plane.point);
                sink.put_vec3(&plane.normal);
                plane.material.write(sink);
            }
        }
    }
}

// laid out in screen-sized units so the default camera frames them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePreset {
    Showcase,
    RandomSpheres,
    MirrorHall,
}

impl ScenePreset {
    pub fn build(&self, screen: Vector2<f32>) -> Geometry {
        match self {
            Self::Showcase => showcase(screen),
            Self::RandomSpheres => random_spheres(&mut rand::thread_rng(), screen, 24),
            Self::MirrorHall => mirror_hall(screen),
        }
    }
}

fn ground(screen: Vector2<f32>, material: Material) -> Geometry {
    Geometry::plane(
        Vector3::new(0.0, -screen.y * 0.12, 0.0),
        Vector3::y(),
        material,
    )
}

pub fn showcase(screen: Vector2<f32>) -> Geometry {
    let (w, h) = (screen.x, screen.y);
    Geometry::group([
        ground(screen, Material::lambertian(Vector3::new(0.4, 0.7, 0.3))),
        Geometry::sphere(
            Vector3::new(w * 0.1, h * 0.05, h * 0.2),
            h * 0.15,
            Material::metal(Vector3::new(0.8, 0.5, 0.4), 0.0),
        ),
        Geometry::sphere(
            Vector3::new(-w * 0.18, 0.0, 0.0),
            50.0,
            Material::lambertian(Vector3::new(0.7, 0.14, 0.2)),
        ),
        Geometry::sphere(
            Vector3::new(w * 0.31, h * -0.04, h * -0.04),
            42.0,
            Material::dielectric(2.4),
        ),
        Geometry::sphere(
            Vector3::new(w * -0.15, h * -0.05, -h * 0.25),
            30.0,
            Material::lambertian(Vector3::new(0.2, 0.53, 0.9)),
        ),
        Geometry::sphere(
            Vector3::new(w * 0.3, h * 0.1, h * -0.3),
            30.0,
            Material::light(Vector3::new(0.9, 0.5, 0.3) * 3.0),
        ),
    ])
}

pub fn random_spheres<R: Rng>(rng: &mut R, screen: Vector2<f32>, count: usize) -> Geometry {
    let floor = -screen.y * 0.12;
    let spheres = (0..count).map(|_| {
        let radius = rng.gen_range(0.02..0.06) * screen.y;
        let spread = random_vec(rng, -0.4..0.4);
        let center = Vector3::new(
            spread.x * screen.x,
            floor + radius,
            spread.z * screen.y,
        );

        let material = match rng.gen_range(0..10) {
            0..=5 => Material::lambertian(random_vec(rng, 0.1..0.9)),
            6..=7 => Material::metal(random_vec(rng, 0.5..1.0), rng.gen_range(0.0..0.4)),
            8 => Material::dielectric(1.5),
            _ => Material::light(random_vec(rng, 1.0..4.0)),
        };
        Geometry::sphere(center, radius, material)
    });

    Geometry::group(
        std::iter::once(ground(screen, Material::lambertian(Vector3::new(0.5, 0.5, 0.5))))
            .chain(spheres),
    )
}

pub fn mirror_hall(screen: Vector2<f32>) -> Geometry {
    let (w, h) = (screen.x, screen.y);
    let mirror = Material::metal(Vector3::new(0.9, 0.9, 0.95), 0.02);

    let walls = Geometry::group([
        Geometry::plane(Vector3::new(-w * 0.45, 0.0, 0.0), Vector3::x(), mirror),
        Geometry::plane(Vector3::new(w * 0.45, 0.0, 0.0), -Vector3::x(), mirror),
    ]);
    let centerpiece = Geometry::group([
        Geometry::sphere(Vector3::new(0.0, h * 0.02, 0.0), h * 0.14, Material::dielectric(1.5)),
        Geometry::group([Geometry::sphere(
            Vector3::new(0.0, h * 0.02, 0.0),
            h * 0.06,
            Material::lambertian(Vector3::new(0.9, 0.2, 0.1)),
        )]),
    ]);

    Geometry::group([
        ground(screen, Material::lambertian(Vector3::new(0.3, 0.3, 0.35))),
        walls,
        centerpiece,
        Geometry::sphere(
            Vector3::new(0.0, h * 0.4, -h * 0.1),
            h * 0.08,
            Material::light(Vector3::new(4.0, 3.8, 3.5)),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::lantern::serialize::{decode_scene, encode};

    #[test]
    fn plane_normal_is_normalized() {
        for normal in [
            Vector3::new(0.0, 5.0, 0.0),
            Vector3::new(3.0, -4.0, 12.0),
            Vector3::new(1e-3, 2e-3, -1e-3),
            Vector3::new(1e-8, 0.0, 0.0),
            Vector3::new(0.0, -3e-9, 4e-9),
        ] {
            let plane = Plane::new(Vector3::zeros(), normal, Material::dielectric(1.5));
            assert!((plane.normal().norm() - 1.0).abs() < 1e-6);
            assert!(plane.normal().dot(&normal) > 0.0);
        }
    }

    #[test]
    #[should_panic(expected = "plane normal must be non-zero")]
    fn zero_normal_is_rejected() {
        Plane::new(Vector3::zeros(), Vector3::zeros(), Material::dielectric(1.5));
    }

    #[test]
    fn material_sizes() {
        let color = Vector3::new(0.1, 0.2, 0.3);
        assert_eq!(Material::lambertian(color).encoded_size(), 24);
        assert_eq!(Material::metal(color, 0.5).encoded_size(), 28);
        assert_eq!(Material::dielectric(1.5).encoded_size(), 16);
        assert_eq!(Material::light(color).encoded_size(), 24);
    }

    #[test]
    fn texture_index_sentinel() {
        assert_eq!(Material::lambertian(Vector3::zeros()).texture_index(), None);
        let textured = Material::Metal {
            albedo: Vector3::zeros(),
            fuzz: 0.0,
            texture_index: 3,
        };
        assert_eq!(textured.texture_index(), Some(3));
    }

    #[test]
    fn push_appends_in_order() {
        let mut group = Geometry::group([]);
        group.push(Geometry::sphere(Vector3::zeros(), 1.0, Material::dielectric(1.5)));
        group.push(Geometry::group([]));

        let Geometry::Group(children) = &group else {
            panic!("expected a group");
        };
        assert_eq!(children[0].kind(), GeometryKind::Sphere);
        assert_eq!(children[1].kind(), GeometryKind::Group);
    }

    #[test]
    #[should_panic(expected = "cannot add a child")]
    fn push_onto_leaf_panics() {
        let mut leaf = Geometry::sphere(Vector3::zeros(), 1.0, Material::dielectric(1.5));
        leaf.push(Geometry::group([]));
    }

    #[test]
    fn presets_cover_every_variant_and_round_trip() {
        let screen = Vector2::new(800.0, 600.0);

        let showcase = showcase(screen);
        assert_eq!(showcase.primitive_count(), 6);
        let Geometry::Group(children) = &showcase else {
            panic!("showcase root must be a group");
        };
        let kinds: Vec<MaterialKind> = children
            .iter()
            .map(|child| match child {
                Geometry::Sphere(sphere) => sphere.material.kind(),
                Geometry::Plane(plane) => plane.material.kind(),
                Geometry::Group(_) => panic!("showcase is flat"),
            })
            .collect();
        for kind in [
            MaterialKind::Lambertian,
            MaterialKind::Metal,
            MaterialKind::Dielectric,
            MaterialKind::LightSource,
        ] {
            assert!(kinds.contains(&kind));
        }

        let random = random_spheres(&mut StdRng::seed_from_u64(3), screen, 10);
        assert_eq!(random.primitive_count(), 11);

        for scene in [showcase, random, mirror_hall(screen)] {
            assert_eq!(decode_scene(&encode(&scene)).unwrap(), scene);
        }
    }

    #[test]
    fn random_spheres_rest_on_the_ground() {
        let screen = Vector2::new(640.0, 480.0);
        let Geometry::Group(children) = random_spheres(&mut StdRng::seed_from_u64(11), screen, 16)
        else {
            panic!("random scene root must be a group");
        };
        for child in &children[1..] {
            let Geometry::Sphere(sphere) = child else {
                panic!("expected only spheres after the ground plane");
            };
            assert!((sphere.center.y - sphere.radius + screen.y * 0.12).abs() < 1e-3);
        }
    }
}
