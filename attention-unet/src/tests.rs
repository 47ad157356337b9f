#[cfg(test)]
mod tests {
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        prelude::*,
        tensor::{Distribution, Tolerance},
    };

    use crate::config::{AttentionUNetConfig, GatingStrategy, InputShape};
    use crate::error::AttentionUNetError;
    use crate::models::SegmentationOutput;

    type TestBackend = NdArray;

    fn expect_invalid(config: &AttentionUNetConfig, fragment: &str) {
        match config.validate() {
            Err(AttentionUNetError::InvalidConfiguration { reason }) => {
                assert!(
                    reason.contains(fragment),
                    "reason `{reason}` does not mention `{fragment}`"
                );
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }

    fn assert_class_distribution(output: Tensor<TestBackend, 4>) {
        let [batch_size, _, height, width] = output.dims();
        let device = output.device();
        output.sum_dim(1).into_data().assert_approx_eq::<f32>(
            &Tensor::<TestBackend, 4>::ones([batch_size, 1, height, width], &device).into_data(),
            Tolerance::default(),
        );
    }

    #[test]
    fn test_single_class_is_rejected() {
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32, 3], 1),
            "Segmentation classes must be > 1",
        );
        assert!(AttentionUNetConfig::new(vec![32, 32, 3], 2)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_input_rank_is_checked() {
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32], 2),
            "Input shape must have 3 or 4 dimensions",
        );
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32, 1, 1, 3], 2),
            "Input shape must have 3 or 4 dimensions",
        );
    }

    #[test]
    fn test_volumetric_input_is_rejected() {
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32, 8, 1], 2),
            "Only 2D inputs are supported",
        );
    }

    #[test]
    fn test_singleton_depth_axis_is_squeezed() {
        let config = AttentionUNetConfig::new(vec![24, 40, 1, 2], 3);

        assert_eq!(
            config.resolved_input_shape().unwrap(),
            InputShape {
                height: 24,
                width: 40,
                channels: 2,
            }
        );
        let model = config.init::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(model.input_shape(), [2, 24, 40]);
    }

    #[test]
    fn test_channel_schedule_is_checked() {
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32, 3], 2).with_channel_schedule(vec![8]),
            "at least 2 levels",
        );
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32, 3], 2).with_channel_schedule(vec![8, 0, 16]),
            "must be positive",
        );
    }

    #[test]
    fn test_dropout_rate_is_checked() {
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32, 3], 2).with_decoder_dropout(Some(1.0)),
            "decoder dropout rate",
        );
        expect_invalid(
            &AttentionUNetConfig::new(vec![32, 32, 3], 2).with_encoder_dropout(Some(-0.1)),
            "encoder dropout rate",
        );
    }

    #[test]
    fn test_invalid_configuration_fails_init() {
        let result =
            AttentionUNetConfig::new(vec![32, 32, 3], 1).init::<TestBackend>(&Default::default());
        assert!(matches!(
            result,
            Err(AttentionUNetError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_config_survives_json() {
        let config = AttentionUNetConfig::new(vec![16, 16, 3], 4)
            .with_gating(GatingStrategy::Downsampled)
            .with_encoder_dropout(Some(0.25));

        let restored = AttentionUNetConfig::load_binary(config.to_string().as_bytes()).unwrap();

        assert_eq!(restored.gating, GatingStrategy::Downsampled);
        assert_eq!(restored.encoder_dropout, Some(0.25));
        assert_eq!(restored.channel_schedule, vec![8, 16, 32, 64]);
    }

    #[test]
    fn test_full_resolution_output() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![64, 64, 3], 3)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 64, 64], Distribution::Default, &device);

        let output = model.forward(x).unwrap();

        assert!(matches!(output, SegmentationOutput::Single(_)));
        let output = output.into_vec().remove(0);
        assert_eq!(output.dims(), [2, 3, 64, 64]);
        assert_class_distribution(output);
    }

    #[test]
    fn test_deep_supervision_outputs_finest_first() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![64, 64, 3], 3)
            .with_deep_supervision(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);

        let outputs = model.forward(x).unwrap();

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs.finest().unwrap().dims(), [1, 3, 64, 64]);
        let dims: Vec<_> = outputs.into_vec().into_iter().map(|o| o.dims()).collect();
        assert_eq!(dims, vec![[1, 3, 64, 64], [1, 3, 32, 32], [1, 3, 16, 16]]);
    }

    #[test]
    fn test_deep_supervision_outputs_are_distributions() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![16, 16, 1], 4)
            .with_channel_schedule(vec![4, 8, 16])
            .with_deep_supervision(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 1, 16, 16], Distribution::Default, &device);

        for output in model.forward(x).unwrap().into_vec() {
            assert_class_distribution(output);
        }
    }

    #[test]
    fn test_output_shapes_match_forward() {
        let device = Default::default();
        for deep_supervision in [false, true] {
            let model = AttentionUNetConfig::new(vec![20, 12, 2], 2)
                .with_channel_schedule(vec![4, 8, 16])
                .with_deep_supervision(deep_supervision)
                .init::<TestBackend>(&device)
                .unwrap();
            let x =
                Tensor::<TestBackend, 4>::random([1, 2, 20, 12], Distribution::Default, &device);

            let shapes: Vec<_> = model
                .forward(x)
                .unwrap()
                .into_vec()
                .into_iter()
                .map(|output| {
                    let [_, classes, height, width] = output.dims();
                    [classes, height, width]
                })
                .collect();

            assert_eq!(shapes, model.output_shapes());
        }
    }

    #[test]
    fn test_skip_connections_cover_every_level() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![32, 32, 3], 2)
            .with_channel_schedule(vec![4, 8, 16, 32, 64])
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);

        let skips = model.forward_encoder(x).unwrap();

        assert_eq!(skips.len(), 5);
        assert_eq!(skips.bottleneck().unwrap().dims(), [1, 64, 2, 2]);
        let dims: Vec<_> = skips.iter().map(|skip| skip.dims()).collect();
        assert_eq!(
            dims,
            vec![
                [1, 64, 2, 2],
                [1, 32, 4, 4],
                [1, 16, 8, 8],
                [1, 8, 16, 16],
                [1, 4, 32, 32],
            ]
        );
    }

    #[test]
    fn test_small_height_is_held_instead_of_pooled() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![3, 64, 1], 2)
            .with_channel_schedule(vec![4, 8, 16, 32])
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 1, 3, 64], Distribution::Default, &device);

        let skips = model.forward_encoder(x.clone()).unwrap();
        assert!(skips
            .iter()
            .all(|skip| skip.dims()[2] == 3 && skip.dims()[3] > 0));
        assert_eq!(model.plan().bottleneck_size, [3, 8]);

        let output = model.forward(x).unwrap().into_vec().remove(0);
        assert_eq!(output.dims(), [1, 2, 3, 64]);
    }

    #[test]
    fn test_odd_sizes_are_reconstructed_exactly() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![9, 13, 1], 2)
            .with_channel_schedule(vec![4, 8, 16])
            .with_deep_supervision(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 1, 9, 13], Distribution::Default, &device);

        let dims: Vec<_> = model
            .forward(x)
            .unwrap()
            .into_vec()
            .into_iter()
            .map(|output| output.dims())
            .collect();

        assert_eq!(dims, vec![[1, 2, 9, 13], [1, 2, 4, 6]]);
    }

    #[test]
    fn test_input_pyramid_halves_each_copy() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![32, 32, 3], 2)
            .with_input_pyramid(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);

        let copies = model.input_pyramid(x.clone());
        let dims: Vec<_> = copies.iter().map(|copy| copy.dims()).collect();
        assert_eq!(dims, vec![[2, 3, 32, 32], [2, 3, 16, 16], [2, 3, 8, 8]]);
        copies[0]
            .clone()
            .into_data()
            .assert_approx_eq::<f32>(&x.clone().into_data(), Tolerance::default());

        let output = model.forward(x).unwrap().into_vec().remove(0);
        assert_eq!(output.dims(), [2, 2, 32, 32]);
    }

    #[test]
    fn test_input_pyramid_follows_clamped_levels() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![12, 6, 1], 2)
            .with_channel_schedule(vec![2, 4, 8, 16])
            .with_input_pyramid(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([1, 1, 12, 6], Distribution::Default, &device);

        let sizes: Vec<_> = model
            .input_pyramid(x.clone())
            .iter()
            .map(|copy| {
                let [_, _, height, width] = copy.dims();
                [height, width]
            })
            .collect();
        let level_sizes: Vec<_> = model.plan().levels.iter().map(|level| level.size).collect();

        assert_eq!(sizes, vec![[12, 6], [6, 3], [3, 3]]);
        assert_eq!(sizes, level_sizes);
        assert_eq!(model.forward(x).unwrap().into_vec()[0].dims(), [1, 2, 12, 6]);
    }

    #[test]
    fn test_input_pyramid_copies_are_averages() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![4, 4, 1], 2)
            .with_channel_schedule(vec![2, 4, 8])
            .with_input_pyramid(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::from_floats(
            [[[
                [1.0, 3.0, 0.0, 0.0],
                [1.0, 3.0, 0.0, 4.0],
                [2.0, 2.0, 5.0, 5.0],
                [2.0, 2.0, 5.0, 5.0],
            ]]],
            &device,
        );

        let copies = model.input_pyramid(x);

        assert_eq!(copies.len(), 2);
        copies[1].clone().into_data().assert_approx_eq::<f32>(
            &Tensor::<TestBackend, 4>::from_floats([[[[2.0, 1.0], [2.0, 5.0]]]], &device)
                .into_data(),
            Tolerance::default(),
        );
    }

    #[test]
    fn test_pyramid_is_empty_without_pyramid_input() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![16, 16, 3], 2)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);

        assert!(model.input_pyramid(x).is_empty());
    }

    #[test]
    fn test_downsampled_gating_matches_direct_shapes() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 24, 40], Distribution::Default, &device);

        let dims: Vec<_> = [GatingStrategy::Direct, GatingStrategy::Downsampled]
            .into_iter()
            .map(|gating| {
                let model = AttentionUNetConfig::new(vec![24, 40, 3], 3)
                    .with_gating(gating)
                    .with_deep_supervision(true)
                    .init::<TestBackend>(&device)
                    .unwrap();
                model
                    .forward(x.clone())
                    .unwrap()
                    .into_vec()
                    .into_iter()
                    .map(|output| output.dims())
                    .collect::<Vec<_>>()
            })
            .collect();

        assert_eq!(dims[0], dims[1]);
    }

    #[test]
    fn test_self_attention_and_batch_renorm_variants_run() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![16, 16, 3], 2)
            .with_channel_schedule(vec![4, 8, 16])
            .with_self_attention(true)
            .with_use_batch_renorm(true)
            .with_input_pyramid(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 16, 16], Distribution::Default, &device);

        let output = model.forward(x).unwrap().into_vec().remove(0);

        assert_eq!(output.dims(), [2, 2, 16, 16]);
        assert_class_distribution(output);
    }

    #[test]
    fn test_training_mode_with_dropout_runs() {
        type TrainBackend = Autodiff<NdArray>;
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![16, 16, 1], 2)
            .with_channel_schedule(vec![4, 8, 16])
            .with_encoder_dropout(Some(0.3))
            .with_decoder_dropout(Some(0.3))
            .with_use_batch_renorm(true)
            .init::<TrainBackend>(&device)
            .unwrap();
        let x = Tensor::<TrainBackend, 4>::random([2, 1, 16, 16], Distribution::Default, &device);

        let output = model.forward(x).unwrap().into_vec().remove(0);
        assert_eq!(output.dims(), [2, 2, 16, 16]);

        output.sum().backward();
    }

    #[test]
    fn test_wrong_input_shape_is_rejected() {
        let device = Default::default();
        let model = AttentionUNetConfig::new(vec![16, 16, 3], 2)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::zeros([1, 1, 16, 16], &device);

        match model.forward(x) {
            Err(AttentionUNetError::InvalidTensorShape { expected, actual }) => {
                assert_eq!(expected, "[batch, 3, 16, 16]");
                assert_eq!(actual, "[1, 1, 16, 16]");
            }
            _ => panic!("Expected InvalidTensorShape error"),
        }
    }

    #[test]
    fn test_models_from_one_config_are_independent() {
        let device = Default::default();
        let config = AttentionUNetConfig::new(vec![8, 8, 1], 2).with_channel_schedule(vec![2, 4]);

        let first = config.init::<TestBackend>(&device).unwrap();
        let second = config.init::<TestBackend>(&device).unwrap();

        assert_eq!(first.num_params(), second.num_params());
        assert_eq!(first.output_shapes(), second.output_shapes());
    }
}
