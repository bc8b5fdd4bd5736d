use nalgebra::Vector3;
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::Rng;
use std::ops::RangeBounds;

pub fn random_vec<G, T, R>(rng: &mut G, range: R) -> Vector3<T>
where
    G: Rng,
    T: SampleUniform,
    R: RangeBounds<T> + SampleRange<T> + Clone,
{
    Vector3::new(
        rng.gen_range(range.clone()),
        rng.gen_range(range.clone()),
        rng.gen_range(range),
    )
}
