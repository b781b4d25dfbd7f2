use ndarray::prelude::*;

pub fn relu(x: Array4<f32>) -> Array4<f32> {
    x.mapv_into(|v| v.max(0.0))
}

#[test]
fn test_relu() {
    let x = array![[[-1.0f32, 0.0], [2.5, -0.5]]].insert_axis(Axis(0));
    assert_eq!(relu(x), array![[[0.0f32, 0.0], [2.5, 0.0]]].insert_axis(Axis(0)));
}
