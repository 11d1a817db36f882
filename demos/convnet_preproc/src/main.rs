use anyhow::Result;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;
use log::info;
use ndarray::{Array, IxDyn};
use percept_candle::{
    convnet::{ConvNet, ConvNetConfig, DataFormat},
    model::{SubModel1, SubModel2},
    util::arrayd_to_tensor,
};

const RAW_DIM: i64 = 10;
const IMAGE_HWC: [i64; 3] = [32, 32, 3];
const OUT_DIM: i64 = 16;
const MODEL_DIR: &str = "./model/convnet_preproc";

/// Builds a convolutional observation preprocessor and embeds a batch
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Batch size of the observation batch
    #[arg(long, default_value_t = 8)]
    batch_size: usize,

    /// Image data format ("channels_last" or "channels_first")
    #[arg(long, default_value = "channels_last")]
    data_format: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    let args = Args::parse();

    let data_format: DataFormat = args.data_format.parse()?;
    let image_shape = match data_format {
        DataFormat::ChannelsLast => IMAGE_HWC,
        DataFormat::ChannelsFirst => [IMAGE_HWC[2], IMAGE_HWC[0], IMAGE_HWC[1]],
    };
    let image_dim: i64 = image_shape.iter().product();
    let config = ConvNetConfig::new(RAW_DIM + image_dim, image_shape, OUT_DIM)
        .data_format(data_format);

    std::fs::create_dir_all(MODEL_DIR)?;
    config.save(format!("{}/config.yaml", MODEL_DIR))?;
    let config = ConvNetConfig::load(format!("{}/config.yaml", MODEL_DIR))?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let net = <ConvNet as SubModel1>::build(vb, config);

    let raw = Array::from_shape_fn(IxDyn(&[args.batch_size, RAW_DIM as usize]), |ix| {
        (ix[0] + ix[1]) as f32 * 0.1
    });
    let image = Array::from_shape_fn(IxDyn(&[args.batch_size, image_dim as usize]), |ix| {
        ((ix[0] * 7 + ix[1]) % 256) as f32 / 255.0
    });
    let raw = arrayd_to_tensor::<_, f32>(raw, false)?;
    let image = arrayd_to_tensor::<_, f32>(image, false)?;

    let embedding = SubModel2::forward(&net, &raw, &image);
    info!("embedding shape: {:?}", embedding.dims());
    assert_eq!(embedding.dims(), &[args.batch_size, net.out_dim() as usize]);
    println!("{:?}", embedding.to_vec2::<f32>()?[0]);

    Ok(())
}
