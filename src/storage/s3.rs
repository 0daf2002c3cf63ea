use super::{Storage, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use anyhow::Result;
use async_trait::async_trait;
use opendal::{layers::TimeoutLayer, Operator};
use std::time::Duration;

/// S3 兼容对象存储（AWS S3、阿里云 OSS、MinIO 等）
pub struct S3Storage {
    operator: Operator,
    name: String,
}

impl S3Storage {
    pub async fn new(
        bucket: &str,
        region: &str,
        access_key: Option<String>,
        secret_key: Option<String>,
        endpoint: Option<String>,
        root: Option<String>,
    ) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default().bucket(bucket).region(region);

        // 未配置密钥时由 opendal 从环境变量读取
        if let Some(ref ak) = access_key {
            builder = builder.access_key_id(ak);
        }
        if let Some(ref sk) = secret_key {
            builder = builder.secret_access_key(sk);
        }

        if let Some(ref ep) = endpoint {
            builder = builder.endpoint(ep);
        }

        if let Some(ref r) = root {
            builder = builder.root(r);
        }

        // 添加超时层
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!(
            "s3://{}{}",
            bucket,
            root.as_deref()
                .map(|r| format!("/{}", r.trim_matches('/')))
                .unwrap_or_default()
        );

        Ok(Self { operator, name })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn write(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.operator.write(key, data).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // S3 删除不存在的对象不会报错
        match self.operator.delete(key).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
