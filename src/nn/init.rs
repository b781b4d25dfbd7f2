// taken from https://github.com/srenevey/neuro with slight modifications
use anyhow::{Context, Error, Result};
use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

/// Used to generate the initial values for the parameters of the model.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// Given constant value.
    Constant(f32),
    /// Normal distribution scaled using Glorot scale factor.
    GlorotNormal,
    /// Uniform distribution scaled using Glorot scale factor.
    GlorotUniform,
    /// Normal distribution scaled using He scale factor.
    HeNormal,
    /// Uniform distribution scaled using He scale factor.
    HeUniform,
    /// Normal distribution scaled using Lecun scale factor.
    LecunNormal,
    /// Uniform distribution scaled using Lecun scale factor.
    LecunUniform,
    /// Ones.
    Ones,
    /// Zeros.
    Zeros,
}

fn scaled_normal<D: Dimension, Sh: ShapeBuilder<Dim = D>>(std: f32, shape: Sh) -> Result<Array<f32, D>> {
    let dist = Normal::new(0.0, std).map_err(|e| Error::msg(format!("bad normal distribution: {e}")))?;
    Ok(Array::random(shape, dist))
}

fn scaled_uniform<D: Dimension, Sh: ShapeBuilder<Dim = D>>(limit: f32, shape: Sh) -> Array<f32, D> {
    Array::random(shape, Uniform::new(-limit, limit))
}

impl Initializer {
    /// Parses the RON form used in configs, e.g. `HeNormal` or `Constant(0.5)`
    pub fn parse(text: &str) -> Result<Self> {
        ron::from_str(text.trim()).with_context(|| format!("Failed to parse initializer {text}"))
    }

    /// Creates a tensor with values drawn from the distribution specified by the initializer.
    ///
    /// # Arguments
    ///
    /// * `shape` - The dimensions of the tensor created.
    /// * `fan_in` - The number of input units.
    /// * `fan_out` - The number of output units.
    pub fn init<D, Sh>(self, shape: Sh, fan_in: usize, fan_out: usize) -> Result<Array<f32, D>>
    where
        D: Dimension,
        Sh: ShapeBuilder<Dim = D>,
    {
        if fan_in == 0 || fan_out == 0 {
            return Err(Error::msg(format!("cannot initialize with fan_in {fan_in}, fan_out {fan_out}")));
        }
        let fan_in = fan_in as f32;
        let fan_out = fan_out as f32;
        let array = match self {
            Initializer::Constant(x) => Array::from_elem(shape, x),
            Initializer::GlorotNormal => scaled_normal((2. / (fan_out + fan_in)).sqrt(), shape)?,
            Initializer::GlorotUniform => scaled_uniform((6. / (fan_out + fan_in)).sqrt(), shape),
            Initializer::HeNormal => scaled_normal((2. / fan_in).sqrt(), shape)?,
            Initializer::HeUniform => scaled_uniform((6. / fan_in).sqrt(), shape),
            Initializer::LecunNormal => scaled_normal((1. / fan_in).sqrt(), shape)?,
            Initializer::LecunUniform => scaled_uniform((3. / fan_in).sqrt(), shape),
            Initializer::Ones => Array::ones(shape),
            Initializer::Zeros => Array::zeros(shape),
        };
        Ok(array)
    }
}

#[test]
fn test_init_shapes() {
    use ndarray::prelude::*;
    let w: Array4<f32> = Initializer::HeNormal.init((8, 3, 3, 3), 27, 72).unwrap();
    assert_eq!(w.dim(), (8, 3, 3, 3));
    let limit = (6f32 / 27.).sqrt();
    let u: Array2<f32> = Initializer::HeUniform.init((16, 16), 27, 27).unwrap();
    assert!(u.iter().all(|x| x.abs() <= limit));
    let c: Array1<f32> = Initializer::Constant(0.5).init(4, 1, 1).unwrap();
    assert!(c.iter().all(|x| *x == 0.5));
    assert!(Initializer::Zeros.init::<Ix1, _>(4, 0, 1).is_err());
}

#[test]
fn test_every_initializer() {
    use ndarray::prelude::*;
    let (fan_in, fan_out) = (27f32, 72f32);
    for (name, limit) in [
        ("GlorotNormal", None),
        ("GlorotUniform", Some((6. / (fan_in + fan_out)).sqrt())),
        ("HeNormal", None),
        ("HeUniform", Some((6. / fan_in).sqrt())),
        ("LecunNormal", None),
        ("LecunUniform", Some((3. / fan_in).sqrt())),
        ("Ones", Some(1.0)),
        ("Zeros", Some(0.0)),
        ("Constant(0.25)", Some(0.25)),
    ] {
        let init = Initializer::parse(name).unwrap();
        let w: Array4<f32> = init.init((8, 3, 3, 3), 27, 72).unwrap();
        assert_eq!(w.dim(), (8, 3, 3, 3), "{name}");
        match limit {
            Some(l) => assert!(w.iter().all(|x| x.abs() <= l), "{name}"),
            None => assert!(w.iter().any(|x| *x != 0.0), "{name}"),
        }
    }
    assert_eq!(Initializer::parse(" LecunNormal ").unwrap(), Initializer::LecunNormal);
    assert!(Initializer::parse("Kaiming").is_err());
}
