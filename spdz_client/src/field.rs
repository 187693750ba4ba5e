// spdz_client/src/field.rs

//! SPDZ 素数域 GF(p) 的元素表示与批量解码。
//!
//! SPDZ 引擎使用 128 位素数域，元素在线上以 16 字节大端整数传输。
//! 本模块提供域元素类型 [`Gfp`]（加法、整数提升、居中还原、十六进制
//! 编码），以及把多个代理的二进制缓冲解码为分片批次 / 输出批次的
//! 辅助函数。域元素一律以规约后的普通剩余表示，不使用蒙哥马利形式。

use crate::error::SpdzClientError;
use spdz_models::enums::RegType;

/// SPDZ 默认的 128 位 gfp 素数。
pub const GFP_PRIME: u128 = 172_035_116_406_933_162_231_178_957_667_602_464_769;

/// 单个域元素在线上的字节长度。
pub const GFP_BYTE_LEN: usize = 16;

/// GF(p) 中的一个元素，内部保存规约到 `[0, p)` 的剩余。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gfp {
    value: u128,
}

impl Gfp {
    /// 由任意 128 位整数构造，自动规约到 `[0, p)`。
    pub fn from_residue(value: u128) -> Gfp {
        Gfp { value: value % GFP_PRIME }
    }

    /// 由 16 字节大端表示构造。
    pub fn from_bytes_be(bytes: &[u8]) -> Result<Gfp, SpdzClientError> {
        let arr: [u8; GFP_BYTE_LEN] = bytes.try_into().map_err(|_| {
            SpdzClientError::ShareDecode(format!(
                "域元素需要 {} 字节，实际 {} 字节",
                GFP_BYTE_LEN,
                bytes.len()
            ))
        })?;
        Ok(Gfp::from_residue(u128::from_be_bytes(arr)))
    }

    /// 转为 16 字节大端表示。
    pub fn to_bytes_be(&self) -> [u8; GFP_BYTE_LEN] {
        self.value.to_be_bytes()
    }

    /// 域内加法。
    pub fn add(&self, other: &Gfp) -> Gfp {
        let (sum, overflow) = self.value.overflowing_add(other.value);
        let value = if overflow || sum >= GFP_PRIME {
            sum.wrapping_sub(GFP_PRIME)
        } else {
            sum
        };
        Gfp { value }
    }

    /// 把一个有符号整数提升到域中，负数映射为 `p - |x|`。
    pub fn lift(input: i64) -> Gfp {
        if input >= 0 {
            Gfp::from_residue(input as u128)
        } else {
            Gfp { value: GFP_PRIME - input.unsigned_abs() as u128 }
        }
    }

    /// 居中还原为有符号整数：剩余大于 `p / 2` 的元素视为负数。
    ///
    /// 还原结果超出 `i64` 表示范围时报错，MPC 引擎输出的明文结果
    /// 不应出现这种量级。
    pub fn to_signed(&self) -> Result<i64, SpdzClientError> {
        let half = GFP_PRIME / 2;
        if self.value <= half {
            i64::try_from(self.value).map_err(|_| {
                SpdzClientError::OutputDecode(format!("域元素 {} 超出 i64 正数范围", self.value))
            })
        } else {
            let magnitude = GFP_PRIME - self.value;
            let magnitude = i64::try_from(magnitude).map_err(|_| {
                SpdzClientError::OutputDecode(format!("域元素 -{} 超出 i64 负数范围", magnitude))
            })?;
            Ok(-magnitude)
        }
    }

    /// 转为 32 个字符的十六进制字符串（发送输入分片时使用）。
    pub fn to_hex_string(&self) -> String {
        hex::encode(self.to_bytes_be())
    }

    /// 内部剩余值。
    pub fn value(&self) -> u128 {
        self.value
    }
}

/// 把各代理同一位置的分片缓冲解码并求和为一个分片批次。
///
/// 每个代理贡献一个缓冲；所有缓冲必须等长且为 16 的整数倍。
/// 批次中第 `j` 个分片是所有代理第 `j` 个 16 字节域元素的域内和。
pub fn decode_share_batch(buffers: &[Vec<u8>]) -> Result<Vec<Gfp>, SpdzClientError> {
    let first_len = match buffers.first() {
        Some(buf) => buf.len(),
        None => {
            return Err(SpdzClientError::ShareDecode("分片批次为空，没有任何代理贡献".into()))
        }
    };

    if first_len == 0 || first_len % GFP_BYTE_LEN != 0 {
        return Err(SpdzClientError::ShareDecode(format!(
            "分片缓冲长度 {} 不是 {} 的正整数倍",
            first_len, GFP_BYTE_LEN
        )));
    }

    for buf in buffers {
        if buf.len() != first_len {
            return Err(SpdzClientError::ShareDecode(format!(
                "各代理的分片缓冲长度不一致: {} != {}",
                buf.len(),
                first_len
            )));
        }
    }

    let count = first_len / GFP_BYTE_LEN;
    let mut shares = Vec::with_capacity(count);
    for j in 0..count {
        let offset = j * GFP_BYTE_LEN;
        let mut sum = Gfp::from_residue(0);
        for buf in buffers {
            let element = Gfp::from_bytes_be(&buf[offset..offset + GFP_BYTE_LEN])?;
            sum = sum.add(&element);
        }
        shares.push(sum);
    }
    Ok(shares)
}

/// 把各代理的输出缓冲按声明顺序拼接并解码为有符号整数列表。
///
/// 所有代理必须报告相同的寄存器类型；`ModP` 载荷按 16 字节域元素
/// 居中还原，`Int` 载荷按 4 字节大端有符号整数读取。
pub fn decode_output_batch(
    batch: &[(RegType, Vec<u8>)],
) -> Result<Vec<i64>, SpdzClientError> {
    let first = match batch.first() {
        Some((reg_type, _)) => *reg_type,
        // 空批次推导不出寄存器类型，线上标签 4 表示 NONE。
        None => return Err(SpdzClientError::UnsupportedRegTypeAggregate(4)),
    };

    for (reg_type, _) in batch {
        if *reg_type != first {
            return Err(SpdzClientError::RegTypeMismatch { first, other: *reg_type });
        }
    }

    let element_len = first.element_len();
    let mut values = Vec::new();
    for (_, data) in batch {
        if data.len() % element_len != 0 {
            return Err(SpdzClientError::OutputDecode(format!(
                "输出缓冲长度 {} 不是 {:?} 元素长度 {} 的整数倍",
                data.len(),
                first,
                element_len
            )));
        }
        for chunk in data.chunks_exact(element_len) {
            let value = match first {
                RegType::ModP => Gfp::from_bytes_be(chunk)?.to_signed()?,
                RegType::Int => {
                    let arr: [u8; 4] = chunk.try_into().map_err(|_| {
                        SpdzClientError::OutputDecode("整数元素切片长度异常".into())
                    })?;
                    i32::from_be_bytes(arr) as i64
                }
            };
            values.push(value);
        }
    }
    Ok(values)
}
